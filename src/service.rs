//! Service layer API for approval workflow operations
//!
//! Each mutating call loads the request, runs the pure transition, saves the
//! result against the loaded version and then hands the audit events to the
//! sink. A version mismatch on save surfaces as `ConcurrentModification` and
//! is never retried here.
use crate::aggregate::RequestStatus;
use crate::audit::{AuditEvent, AuditSink};
use crate::config::DecisionPolicy;
use crate::error::EngineError;
use crate::projection::{self, PendingApproval};
use crate::request::{ApprovalRequest, DecisionInput, Transition};
use crate::step::ApprovalStepView;
use crate::store::RequestStore;
use crate::types::{EntityId, EntityType, PrincipalId, RequestId, Role, TimeStamp};
use crate::utils;
use std::collections::BTreeSet;

pub struct ApprovalService<S, A> {
    store: S,
    audit: A,
    policy: DecisionPolicy,
}

impl<S: RequestStore, A: AuditSink> ApprovalService<S, A> {
    pub fn new(store: S, audit: A) -> Self {
        Self {
            store,
            audit,
            policy: DecisionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Load request from the store
    fn load(&self, request_id: &RequestId) -> Result<ApprovalRequest, EngineError> {
        self.store
            .load(request_id)?
            .ok_or_else(|| EngineError::RequestNotFound(request_id.clone()))
    }

    /// Submit a new entity for approval, one step per role in order
    pub fn create_request(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        creator_id: PrincipalId,
        roles: Vec<Role>,
    ) -> Result<ApprovalRequest, EngineError> {
        let request_id =
            utils::new_request_id().map_err(|e| EngineError::IdGeneration(e.to_string()))?;

        let request = ApprovalRequest::create(
            request_id,
            entity_type,
            entity_id,
            creator_id,
            roles,
            TimeStamp::new(),
        )?;

        if !self.store.save(&request, 0)? {
            return Err(EngineError::ConcurrentModification {
                id: request.id().clone(),
                expected_version: 0,
            });
        }

        tracing::info!(
            request_id = %request.id(),
            entity_type = %request.entity_type(),
            entity_id = %request.entity_id(),
            steps = request.ledger().len(),
            "approval request created"
        );

        Ok(request)
    }

    /// Record a decision on the request's current step
    pub fn record_decision(
        &self,
        request_id: &RequestId,
        input: DecisionInput,
    ) -> Result<ApprovalRequest, EngineError> {
        let request = self.load(request_id)?;

        let transition = request
            .record_decision(&input, &self.policy, TimeStamp::new())
            .inspect_err(|e| {
                tracing::debug!(
                    request_id = %request_id,
                    step_order = input.step_order,
                    principal_id = %input.principal_id,
                    error = %e,
                    "decision refused"
                )
            })?;

        let committed = self.commit(request.version(), transition)?;

        tracing::info!(
            request_id = %request_id,
            step_order = input.step_order,
            outcome = %input.outcome,
            status = %committed.status(),
            "decision committed"
        );

        Ok(committed)
    }

    /// Clear the halted step after the owning subsystem resubmits the entity
    pub fn reset_step_for_resubmission(
        &self,
        request_id: &RequestId,
    ) -> Result<ApprovalRequest, EngineError> {
        let request = self.load(request_id)?;

        let transition = request.reset_step_for_resubmission(TimeStamp::new())?;
        let committed = self.commit(request.version(), transition)?;

        tracing::info!(
            request_id = %request_id,
            status = %committed.status(),
            "request reset for resubmission"
        );

        Ok(committed)
    }

    pub fn get_status(&self, request_id: &RequestId) -> Result<RequestStatus, EngineError> {
        Ok(self.load(request_id)?.status())
    }

    pub fn get_steps(&self, request_id: &RequestId) -> Result<Vec<ApprovalStepView>, EngineError> {
        Ok(self.load(request_id)?.step_views())
    }

    /// Requests whose current step a holder of `principal_roles` can decide
    pub fn pending_for(
        &self,
        principal_roles: &BTreeSet<Role>,
    ) -> Result<Vec<PendingApproval>, EngineError> {
        let requests = self.store.scan()?;
        Ok(projection::pending_for(&requests, principal_roles))
    }

    fn commit(
        &self,
        expected_version: u64,
        transition: Transition,
    ) -> Result<ApprovalRequest, EngineError> {
        let Transition { request, events } = transition;

        if !self.store.save(&request, expected_version)? {
            tracing::warn!(
                request_id = %request.id(),
                expected_version,
                "version conflict on save"
            );
            return Err(EngineError::ConcurrentModification {
                id: request.id().clone(),
                expected_version,
            });
        }

        self.deliver(&events);
        Ok(request)
    }

    // the decision is already committed, so delivery failures are only logged
    fn deliver(&self, events: &[AuditEvent]) {
        for event in events {
            if let Err(e) = self.audit.emit(event) {
                tracing::warn!(
                    request_id = %event.request_id,
                    step_order = event.step_order,
                    error = %e,
                    "audit delivery failed"
                );
            }
        }
    }
}
