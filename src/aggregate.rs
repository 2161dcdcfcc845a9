//! Request-level status derived from step statuses
use crate::step::{ApprovalStep, StepStatus};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum RequestStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Submitted,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
    #[n(4)]
    RevisionRequested,
}

impl RequestStatus {
    /// Approved and rejected accept no further decisions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Submitted => "submitted",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::RevisionRequested => "revision_requested",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn aggregate(steps: &[ApprovalStep]) -> RequestStatus {
    aggregate_statuses(steps.iter().map(ApprovalStep::status))
}

/// Rolls step statuses up into a request status. First match wins:
/// any rejected, then any revision requested, then all approved, otherwise
/// submitted once some step carries an approval and draft before that.
///
/// Total over any sequence, including ones the ledger would never produce.
/// An empty sequence is a draft.
pub fn aggregate_statuses<I>(statuses: I) -> RequestStatus
where
    I: IntoIterator<Item = StepStatus>,
{
    let mut any_rejected = false;
    let mut any_revision = false;
    let mut any_approved = false;
    let mut all_approved = true;
    let mut empty = true;

    for status in statuses {
        empty = false;
        match status {
            StepStatus::Rejected => any_rejected = true,
            StepStatus::RevisionRequested => any_revision = true,
            StepStatus::Approved => any_approved = true,
            StepStatus::Pending => {}
        }
        all_approved &= status == StepStatus::Approved;
    }

    if any_rejected {
        RequestStatus::Rejected
    } else if any_revision {
        RequestStatus::RevisionRequested
    } else if all_approved && !empty {
        RequestStatus::Approved
    } else if any_approved {
        RequestStatus::Submitted
    } else {
        RequestStatus::Draft
    }
}
