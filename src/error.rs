use crate::aggregate::RequestStatus;
use crate::step::Outcome;
use crate::types::{PrincipalId, RequestId, Role};
use std::convert::Infallible;

/// Every failure a caller of the engine can observe. Each variant maps to a
/// distinct user-facing message, so none of them are folded together.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("approval request `{0}` was not found")]
    RequestNotFound(RequestId),
    #[error("an approval request needs at least one step")]
    EmptyStepList,
    #[error("step {got} is not addressable, the current step is {expected}")]
    InvalidStepOrder { expected: u32, got: u32 },
    #[error("request `{id}` is already {status}, no further decisions are accepted")]
    RequestAlreadyTerminal { id: RequestId, status: RequestStatus },
    #[error("request is halted awaiting resubmission and has no active step")]
    NoActiveStep,
    #[error("principal `{principal_id}` does not hold role `{required_role}` for step {step_order}")]
    RoleNotEligible {
        principal_id: PrincipalId,
        required_role: Role,
        step_order: u32,
    },
    #[error("step {step_order} was already decided by `{decided_by}`")]
    DuplicateDecision {
        step_order: u32,
        decided_by: PrincipalId,
    },
    #[error("request `{id}` changed after version {expected_version} was loaded")]
    ConcurrentModification { id: RequestId, expected_version: u64 },
    #[error("request `{id}` is {status}, only a revision_requested request can be reset")]
    NotAwaitingResubmission { id: RequestId, status: RequestStatus },
    #[error("a comment is required to {0}")]
    CommentRequired(Outcome),
    #[error("comment is {len} characters, the limit is {max}")]
    CommentTooLong { len: usize, max: usize },
    #[error("failed to generate request id: {0}")]
    IdGeneration(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Sled(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("stored record for `{0}` violates step ledger invariants")]
    MalformedRecord(RequestId),
}

/// Audit delivery failures. These are logged by the service and never reach
/// the caller of a transition.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode audit event: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
