//! Approval steps, decision outcomes and the read-only step view
use crate::types::{PrincipalId, Role, TimeStamp};
use chrono::Utc;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum StepStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    RevisionRequested,
}

impl StepStatus {
    pub fn is_decided(self) -> bool {
        self != StepStatus::Pending
    }
    /// Rejected and revision requested both stop progression past this step.
    pub fn halts(self) -> bool {
        matches!(self, StepStatus::Rejected | StepStatus::RevisionRequested)
    }
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
            StepStatus::RevisionRequested => "revision_requested",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    minicbor::Encode,
    minicbor::Decode,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[n(0)]
    Approve,
    #[n(1)]
    Reject,
    #[n(2)]
    RequestRevision,
}

impl Outcome {
    pub fn resulting_status(self) -> StepStatus {
        match self {
            Outcome::Approve => StepStatus::Approved,
            Outcome::Reject => StepStatus::Rejected,
            Outcome::RequestRevision => StepStatus::RevisionRequested,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Approve => "approve",
            Outcome::Reject => "reject",
            Outcome::RequestRevision => "request_revision",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision as handed to the ledger. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub comment: Option<String>,
    pub principal_id: PrincipalId,
    pub role: Role,
}

/// What a decided step keeps about the decision that settled it.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct StepDecision {
    #[n(0)]
    pub principal_id: PrincipalId,
    #[n(1)]
    pub role: Role,
    #[n(2)]
    pub decided_at: TimeStamp<Utc>,
    #[n(3)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ApprovalStep {
    #[n(0)]
    order: u32, // 1-based, contiguous within a request
    #[n(1)]
    required_role: Role,
    #[n(2)]
    status: StepStatus,
    #[n(3)]
    decision: Option<StepDecision>,
}

impl ApprovalStep {
    pub(crate) fn pending(order: u32, required_role: Role) -> Self {
        Self {
            order,
            required_role,
            status: StepStatus::Pending,
            decision: None,
        }
    }
    pub(crate) fn decide(&mut self, decision: &Decision, decided_at: TimeStamp<Utc>) {
        self.status = decision.outcome.resulting_status();
        self.decision = Some(StepDecision {
            principal_id: decision.principal_id.clone(),
            role: decision.role.clone(),
            decided_at,
            comment: decision.comment.clone(),
        });
    }
    pub(crate) fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.decision = None;
    }

    pub fn order(&self) -> u32 {
        self.order
    }
    pub fn required_role(&self) -> &Role {
        &self.required_role
    }
    pub fn status(&self) -> StepStatus {
        self.status
    }
    pub fn decision(&self) -> Option<&StepDecision> {
        self.decision.as_ref()
    }
    pub fn decided_by(&self) -> Option<&PrincipalId> {
        self.decision.as_ref().map(|d| &d.principal_id)
    }
    pub fn decided_at(&self) -> Option<&TimeStamp<Utc>> {
        self.decision.as_ref().map(|d| &d.decided_at)
    }
    pub fn comment(&self) -> Option<&str> {
        self.decision.as_ref().and_then(|d| d.comment.as_deref())
    }
}

/// Flattened step for rendering progress chips and "step 2 of 4" labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalStepView {
    pub order: u32,
    pub total: u32,
    pub required_role: Role,
    pub status: StepStatus,
    pub is_current: bool,
    pub decided_by: Option<PrincipalId>,
    pub decided_at: Option<TimeStamp<Utc>>,
    pub comment: Option<String>,
}

impl ApprovalStepView {
    pub(crate) fn from_step(step: &ApprovalStep, total: u32, is_current: bool) -> Self {
        Self {
            order: step.order,
            total,
            required_role: step.required_role.clone(),
            status: step.status,
            is_current,
            decided_by: step.decided_by().cloned(),
            decided_at: step.decided_at().cloned(),
            comment: step.comment().map(str::to_owned),
        }
    }
    pub fn label(&self) -> String {
        format!("step {} of {}", self.order, self.total)
    }
}
