//! The approval request aggregate root
//!
//! Transitions are pure: they take `&self` and return a [`Transition`] holding
//! the next request state and the audit events it produced. Persisting the new
//! state and delivering the events is the caller's job.
use crate::aggregate::{RequestStatus, aggregate};
use crate::audit::{AuditAction, AuditEvent};
use crate::config::DecisionPolicy;
use crate::error::EngineError;
use crate::ledger::StepLedger;
use crate::role_gate;
use crate::step::{ApprovalStep, ApprovalStepView, Decision, Outcome};
use crate::types::{EntityId, EntityType, PrincipalId, RequestId, Role, TimeStamp};
use chrono::Utc;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ApprovalRequest {
    #[n(0)]
    id: RequestId,
    #[n(1)]
    entity_type: EntityType,
    #[n(2)]
    entity_id: EntityId,
    #[n(3)]
    created_at: TimeStamp<Utc>,
    #[n(4)]
    created_by: PrincipalId,
    #[n(5)]
    ledger: StepLedger,
    #[n(6)]
    version: u64, // bumped by every transition, checked on save
}

/// A decision as submitted by the calling layer. The caller names the step
/// it means to decide, which is what lets replays and skips be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionInput {
    pub step_order: u32,
    pub principal_id: PrincipalId,
    pub principal_roles: BTreeSet<Role>,
    pub outcome: Outcome,
    pub comment: Option<String>,
}

impl DecisionInput {
    pub fn new<R>(
        step_order: u32,
        principal_id: impl Into<PrincipalId>,
        principal_roles: R,
        outcome: Outcome,
    ) -> Self
    where
        R: IntoIterator,
        R::Item: Into<Role>,
    {
        Self {
            step_order,
            principal_id: principal_id.into(),
            principal_roles: principal_roles.into_iter().map(Into::into).collect(),
            outcome,
            comment: None,
        }
    }
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub request: ApprovalRequest,
    pub events: Vec<AuditEvent>,
}

/// Version carried by a freshly created request. Saving it expects no prior
/// record, which the stores model as version 0.
pub const INITIAL_VERSION: u64 = 1;

impl ApprovalRequest {
    pub fn create<I>(
        id: RequestId,
        entity_type: EntityType,
        entity_id: EntityId,
        created_by: PrincipalId,
        roles: I,
        created_at: TimeStamp<Utc>,
    ) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Role>,
    {
        let ledger = StepLedger::new(roles)?;

        Ok(Self {
            id,
            entity_type,
            entity_id,
            created_at,
            created_by,
            ledger,
            version: INITIAL_VERSION,
        })
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn created_by(&self) -> &PrincipalId {
        &self.created_by
    }
    pub fn ledger(&self) -> &StepLedger {
        &self.ledger
    }
    pub fn steps(&self) -> &[ApprovalStep] {
        self.ledger.steps()
    }
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Always recomputed from the steps, never stored.
    pub fn status(&self) -> RequestStatus {
        aggregate(self.ledger.steps())
    }
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
    pub fn current_step(&self) -> Option<&ApprovalStep> {
        self.ledger.current_step()
    }

    pub fn step_views(&self) -> Vec<ApprovalStepView> {
        let total = self.ledger.len();
        let current = self.current_step().map(ApprovalStep::order);

        self.ledger
            .steps()
            .iter()
            .map(|step| ApprovalStepView::from_step(step, total, Some(step.order()) == current))
            .collect()
    }

    /// Records a decision against the current step.
    ///
    /// Checks run in a fixed order so the same input always fails the same
    /// way: terminal, halted, already decided, wrong step, role, comment.
    pub fn record_decision(
        &self,
        input: &DecisionInput,
        policy: &DecisionPolicy,
        decided_at: TimeStamp<Utc>,
    ) -> Result<Transition, EngineError> {
        let status = self.status();
        if status.is_terminal() {
            return Err(EngineError::RequestAlreadyTerminal {
                id: self.id.clone(),
                status,
            });
        }

        // a halted step blocks every decision until the request is reset
        if self.ledger.is_halted() {
            return Err(EngineError::NoActiveStep);
        }

        if let Some(decided_by) = self
            .ledger
            .step(input.step_order)
            .and_then(ApprovalStep::decided_by)
        {
            return Err(EngineError::DuplicateDecision {
                step_order: input.step_order,
                decided_by: decided_by.clone(),
            });
        }

        let current = self.ledger.current_step().ok_or(EngineError::NoActiveStep)?;
        if current.order() != input.step_order {
            return Err(EngineError::InvalidStepOrder {
                expected: current.order(),
                got: input.step_order,
            });
        }

        if !role_gate::is_eligible(&input.principal_roles, current) {
            return Err(EngineError::RoleNotEligible {
                principal_id: input.principal_id.clone(),
                required_role: current.required_role().clone(),
                step_order: current.order(),
            });
        }

        policy.check_comment(input.outcome, input.comment.as_deref())?;

        let decision = Decision {
            outcome: input.outcome,
            comment: input
                .comment
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned),
            principal_id: input.principal_id.clone(),
            role: current.required_role().clone(),
        };

        let ledger = self
            .ledger
            .apply_decision(input.step_order, &decision, decided_at.clone())?;
        let request = self.with_ledger(ledger);

        let event = AuditEvent {
            request_id: self.id.clone(),
            step_order: input.step_order,
            action: AuditAction::Decided {
                outcome: decision.outcome,
                principal_id: decision.principal_id,
            },
            resulting_status: request.status(),
            timestamp: decided_at,
        };

        Ok(Transition {
            request,
            events: vec![event],
        })
    }

    /// Moves a revision_requested request back into progress by clearing the
    /// halted step. The resubmission itself belongs to the caller.
    pub fn reset_step_for_resubmission(
        &self,
        reset_at: TimeStamp<Utc>,
    ) -> Result<Transition, EngineError> {
        let status = self.status();
        if status != RequestStatus::RevisionRequested {
            return Err(EngineError::NotAwaitingResubmission {
                id: self.id.clone(),
                status,
            });
        }

        let step_order = self
            .ledger
            .halted_step()
            .map(ApprovalStep::order)
            .ok_or(EngineError::NoActiveStep)?;
        let ledger = self
            .ledger
            .reset_halted_step()
            .ok_or(EngineError::NoActiveStep)?;
        let request = self.with_ledger(ledger);

        let event = AuditEvent {
            request_id: self.id.clone(),
            step_order,
            action: AuditAction::ResubmissionReset,
            resulting_status: request.status(),
            timestamp: reset_at,
        };

        Ok(Transition {
            request,
            events: vec![event],
        })
    }

    fn with_ledger(&self, ledger: StepLedger) -> Self {
        Self {
            ledger,
            version: self.version + 1,
            ..self.clone()
        }
    }
}
