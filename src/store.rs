//! Persistence adapters for approval requests
//!
//! Requests are stored whole as CBOR, keyed by request id. Every save is a
//! compare-and-write on the request version: `save` returns `Ok(false)` when
//! the stored version is not the one the caller loaded.
use crate::config::StorageConfig;
use crate::error::StoreError;
use crate::request::ApprovalRequest;
use crate::types::RequestId;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_TREE: &str = "approval_requests";

pub trait RequestStore {
    fn load(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, StoreError>;
    /// `expected_version` is the version the caller loaded, or 0 for a
    /// request that must not exist yet.
    fn save(&self, request: &ApprovalRequest, expected_version: u64) -> Result<bool, StoreError>;
    fn scan(&self) -> Result<Vec<ApprovalRequest>, StoreError>;
}

impl<T: RequestStore + ?Sized> RequestStore for Arc<T> {
    fn load(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        (**self).load(id)
    }
    fn save(&self, request: &ApprovalRequest, expected_version: u64) -> Result<bool, StoreError> {
        (**self).save(request, expected_version)
    }
    fn scan(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        (**self).scan()
    }
}

fn decode_checked(bytes: &[u8]) -> Result<ApprovalRequest, StoreError> {
    let request: ApprovalRequest = minicbor::decode(bytes)?;
    if !request.ledger().is_well_formed() {
        return Err(StoreError::MalformedRecord(request.id().clone()));
    }
    Ok(request)
}

#[derive(Clone)]
pub struct SledStore {
    tree: sled::Tree,
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, StoreError> {
        Self::with_tree(&instance, DEFAULT_TREE)
    }

    pub fn with_tree(instance: &sled::Db, tree: &str) -> Result<Self, StoreError> {
        Ok(Self {
            tree: instance.open_tree(tree)?,
        })
    }

    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let db = sled::open(&config.path)?;
        Self::with_tree(&db, &config.tree)
    }
}

impl RequestStore for SledStore {
    fn load(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        match self.tree.get(id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(decode_checked(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, request: &ApprovalRequest, expected_version: u64) -> Result<bool, StoreError> {
        let key = request.id().as_str().as_bytes().to_vec();
        let encoded = minicbor::to_vec(request)?;

        // the read and the write share one transaction, so two writers that
        // loaded the same version cannot both succeed
        let outcome: TransactionResult<bool, StoreError> = self.tree.transaction(|tx| {
            let stored_version = match tx.get(&key)? {
                Some(bytes) => {
                    let stored: ApprovalRequest = minicbor::decode(&bytes)
                        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                    stored.version()
                }
                None => 0,
            };
            if stored_version != expected_version {
                return Ok(false);
            }
            tx.insert(key.as_slice(), encoded.as_slice())?;
            Ok(true)
        });

        match outcome {
            Ok(saved) => Ok(saved),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
        }
    }

    fn scan(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        self.tree
            .iter()
            .values()
            .map(|value| decode_checked(&value?))
            .collect()
    }
}

/// Process-local store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    requests: Arc<Mutex<HashMap<RequestId, ApprovalRequest>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestStore for MemoryStore {
    fn load(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        let requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(requests.get(id).cloned())
    }

    fn save(&self, request: &ApprovalRequest, expected_version: u64) -> Result<bool, StoreError> {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        let stored_version = requests.get(request.id()).map_or(0, ApprovalRequest::version);
        if stored_version != expected_version {
            return Ok(false);
        }
        requests.insert(request.id().clone(), request.clone());
        Ok(true)
    }

    fn scan(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        let requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(requests.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityType, Role, TimeStamp};
    use tempfile::tempdir;

    fn request(id: &str) -> ApprovalRequest {
        ApprovalRequest::create(
            id.into(),
            EntityType::Equipment,
            "eq-7".into(),
            "creator".into(),
            [Role::from("a"), Role::from("b")],
            TimeStamp::new(),
        )
        .unwrap()
    }

    fn exercise_version_check(store: &dyn RequestStore) {
        let original = request("apr_1store");

        assert!(store.save(&original, 0).unwrap());
        // a second create of the same id is a conflict
        assert!(!store.save(&original, 0).unwrap());

        let loaded = store.load(original.id()).unwrap().unwrap();
        assert_eq!(loaded, original);

        // writing with a stale version is refused and leaves the record alone
        assert!(!store.save(&original, 7).unwrap());
        assert_eq!(store.load(original.id()).unwrap().unwrap(), original);

        assert!(store.load(&"apr_1missing".into()).unwrap().is_none());
        assert_eq!(store.scan().unwrap().len(), 1);
    }

    #[test]
    fn memory_store_checks_versions() {
        exercise_version_check(&MemoryStore::new());
    }

    #[test]
    fn sled_store_checks_versions() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("store.db"))?);

        exercise_version_check(&SledStore::new(db)?);
        Ok(())
    }

    #[test]
    fn sled_store_opens_from_config() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let config = StorageConfig {
            path: temp_dir.path().join("configured.db"),
            tree: "custom_tree".into(),
        };

        let store = SledStore::open(&config)?;
        assert!(store.save(&request("apr_1config"), 0)?);
        assert_eq!(store.scan()?.len(), 1);
        Ok(())
    }

    #[test]
    fn malformed_record_is_rejected_on_load() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("malformed.db"))?);
        let store = SledStore::new(Arc::clone(&db))?;

        let record = BadLedgerRecord::from(&request("apr_1bad"));
        db.open_tree(DEFAULT_TREE)?
            .insert("apr_1bad", minicbor::to_vec(&record)?)?;

        let result = store.load(&"apr_1bad".into());
        assert!(matches!(result, Err(StoreError::MalformedRecord(_))));
        Ok(())
    }

    /// Mirrors the stored layout of a request but lets step statuses be set freely.
    #[derive(minicbor::Encode)]
    struct BadLedgerRecord {
        #[n(0)]
        id: RequestId,
        #[n(1)]
        entity_type: EntityType,
        #[n(2)]
        entity_id: crate::types::EntityId,
        #[n(3)]
        created_at: TimeStamp<chrono::Utc>,
        #[n(4)]
        created_by: crate::types::PrincipalId,
        #[n(5)]
        ledger: BadLedger,
        #[n(6)]
        version: u64,
    }

    #[derive(minicbor::Encode)]
    struct BadLedger {
        #[n(0)]
        steps: Vec<BadStep>,
    }

    #[derive(minicbor::Encode)]
    struct BadStep {
        #[n(0)]
        order: u32,
        #[n(1)]
        required_role: Role,
        #[n(2)]
        status: crate::step::StepStatus,
        #[n(3)]
        decision: Option<crate::step::StepDecision>,
    }

    impl From<&ApprovalRequest> for BadLedgerRecord {
        fn from(request: &ApprovalRequest) -> Self {
            let steps = request
                .steps()
                .iter()
                .map(|step| BadStep {
                    order: step.order(),
                    required_role: step.required_role().clone(),
                    // approved without a decision record, behind a pending step
                    status: if step.order() == 2 {
                        crate::step::StepStatus::Approved
                    } else {
                        step.status()
                    },
                    decision: None,
                })
                .collect();

            Self {
                id: request.id().clone(),
                entity_type: request.entity_type().clone(),
                entity_id: request.entity_id().clone(),
                created_at: request.created_at().clone(),
                created_by: request.created_by().clone(),
                ledger: BadLedger { steps },
                version: request.version(),
            }
        }
    }
}
