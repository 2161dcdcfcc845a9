//! Audit events emitted by transitions, and the sinks that receive them
//!
//! Transitions return their events instead of delivering them. Delivery is
//! best-effort: a sink failure is logged and never undoes a committed decision.
use crate::aggregate::RequestStatus;
use crate::error::AuditError;
use crate::step::Outcome;
use crate::types::{PrincipalId, RequestId, TimeStamp};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct AuditEvent {
    #[n(0)]
    pub request_id: RequestId,
    #[n(1)]
    pub step_order: u32,
    #[n(2)]
    pub action: AuditAction,
    #[n(3)]
    pub resulting_status: RequestStatus,
    #[n(4)]
    pub timestamp: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum AuditAction {
    #[n(0)]
    Decided {
        #[n(0)]
        outcome: Outcome,
        #[n(1)]
        principal_id: PrincipalId,
    },
    #[n(1)]
    ResubmissionReset,
}

impl AuditEvent {
    /// CBOR encoding of the event together with its sha256 digest, so a sink
    /// can drop redelivered events by content hash.
    pub fn build(&self) -> Result<(String, Vec<u8>), AuditError> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

pub trait AuditSink {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        (**self).emit(event)
    }
}

/// Writes each event as a structured log line under the `approval_audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let (digest, _) = event.build()?;
        match &event.action {
            AuditAction::Decided {
                outcome,
                principal_id,
            } => tracing::info!(
                target: "approval_audit",
                request_id = %event.request_id,
                step_order = event.step_order,
                outcome = %outcome,
                principal_id = %principal_id,
                status = %event.resulting_status,
                timestamp = %event.timestamp,
                digest = %digest,
                "decision recorded"
            ),
            AuditAction::ResubmissionReset => tracing::info!(
                target: "approval_audit",
                request_id = %event.request_id,
                step_order = event.step_order,
                status = %event.resulting_status,
                timestamp = %event.timestamp,
                digest = %digest,
                "step reset for resubmission"
            ),
        }
        Ok(())
    }
}

/// Keeps every event in memory. Useful for tests and for callers that batch
/// delivery themselves.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(outcome: Outcome) -> AuditEvent {
        AuditEvent {
            request_id: "apr_1test".into(),
            step_order: 1,
            action: AuditAction::Decided {
                outcome,
                principal_id: "user_1".into(),
            },
            resulting_status: RequestStatus::Submitted,
            timestamp: TimeStamp::new(),
        }
    }

    #[test]
    fn digest_is_stable_for_identical_events() {
        let original = event(Outcome::Approve);

        let (first, cbor) = original.build().unwrap();
        let (second, _) = original.clone().build().unwrap();
        assert_eq!(first, second);

        let decode: AuditEvent = minicbor::decode(&cbor).unwrap();
        assert_eq!(decode, original);
    }

    #[test]
    fn digest_differs_by_outcome() {
        let approve = event(Outcome::Approve);
        let mut reject = event(Outcome::Reject);
        reject.timestamp = approve.timestamp.clone();

        assert_ne!(approve.build().unwrap().0, reject.build().unwrap().0);
    }

    #[test]
    fn memory_sink_collects_through_arc() {
        let sink = Arc::new(MemoryAuditSink::new());
        let shared = Arc::clone(&sink);

        shared.emit(&event(Outcome::Approve)).unwrap();
        TracingAuditSink.emit(&event(Outcome::Reject)).unwrap();

        assert_eq!(sink.events().len(), 1);
    }
}
