//! A multi-step, role-gated approval workflow engine.
//!
//! A submitted entity moves through an ordered list of steps. Each step is
//! decided by a principal holding its required role, only the current step is
//! addressable, and the request status is always derived from the steps.

pub mod aggregate;
pub mod audit;
pub mod config;
pub mod error;
pub mod ledger;
pub mod projection;
pub mod request;
pub mod role_gate;
pub mod service;
pub mod step;
pub mod store;
pub mod types;
pub mod utils;

pub use aggregate::RequestStatus;
pub use error::EngineError;
pub use request::{ApprovalRequest, DecisionInput};
pub use service::ApprovalService;
pub use step::{Outcome, StepStatus};
