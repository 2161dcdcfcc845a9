//! Read-only "my pending approvals" view over stored requests
use crate::request::ApprovalRequest;
use crate::role_gate;
use crate::types::{EntityId, EntityType, RequestId, Role, TimeStamp};
use chrono::Utc;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub request_id: RequestId,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub step_order: u32,
    pub total_steps: u32,
    pub required_role: Role,
    pub created_at: TimeStamp<Utc>,
}

/// Requests whose current step the principal could decide right now, oldest
/// first. Halted and terminal requests never appear.
pub fn pending_for<'a, I>(requests: I, principal_roles: &BTreeSet<Role>) -> Vec<PendingApproval>
where
    I: IntoIterator<Item = &'a ApprovalRequest>,
{
    let mut pending: Vec<PendingApproval> = requests
        .into_iter()
        .filter_map(|request| {
            let step = request.current_step()?;
            if !role_gate::is_eligible(principal_roles, step) {
                return None;
            }
            Some(PendingApproval {
                request_id: request.id().clone(),
                entity_type: request.entity_type().clone(),
                entity_id: request.entity_id().clone(),
                step_order: step.order(),
                total_steps: request.ledger().len(),
                required_role: step.required_role().clone(),
                created_at: request.created_at().clone(),
            })
        })
        .collect();

    pending.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.request_id.cmp(&b.request_id))
    });
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecisionPolicy;
    use crate::request::DecisionInput;
    use crate::step::Outcome;

    fn request(id: &str, roles: &[&str]) -> ApprovalRequest {
        ApprovalRequest::create(
            id.into(),
            EntityType::Rfi,
            format!("rfi-{id}").into(),
            "creator".into(),
            roles.iter().map(|r| Role::from(*r)),
            TimeStamp::new(),
        )
        .unwrap()
    }

    fn request_at(id: &str, created_at: TimeStamp<Utc>) -> ApprovalRequest {
        ApprovalRequest::create(
            id.into(),
            EntityType::Document,
            format!("doc-{id}").into(),
            "creator".into(),
            [Role::from("qa")],
            created_at,
        )
        .unwrap()
    }

    fn roles(names: &[&str]) -> BTreeSet<Role> {
        names.iter().map(|n| Role::from(*n)).collect()
    }

    #[test]
    fn lists_only_requests_waiting_on_held_roles() {
        let first = request("apr_1a", &["qa", "pm"]);
        let second = request("apr_1b", &["pm"]);
        let advanced = first
            .record_decision(
                &DecisionInput::new(1, "user_qa", ["qa"], Outcome::Approve),
                &DecisionPolicy::default(),
                TimeStamp::new(),
            )
            .unwrap()
            .request;

        let for_qa = pending_for([&first, &second], &roles(&["qa"]));
        assert_eq!(for_qa.len(), 1);
        assert_eq!(for_qa[0].request_id.as_str(), "apr_1a");

        let for_pm = pending_for([&advanced, &second], &roles(&["pm"]));
        assert_eq!(for_pm.len(), 2);
        assert!(for_pm.iter().any(|p| p.step_order == 2 && p.total_steps == 2));
    }

    #[test]
    fn halted_requests_are_not_pending() {
        let halted = request("apr_1h", &["qa"])
            .record_decision(
                &DecisionInput::new(1, "user_qa", ["qa"], Outcome::RequestRevision),
                &DecisionPolicy::default(),
                TimeStamp::new(),
            )
            .unwrap()
            .request;

        assert!(pending_for([&halted], &roles(&["qa"])).is_empty());
    }

    #[test]
    fn oldest_request_comes_first() {
        let now = Utc::now();
        let newer = request_at("apr_1a", now.into());
        let older = request_at("apr_1z", (now - chrono::Duration::minutes(5)).into());
        let tied = request_at("apr_1b", now.into());

        let listed: Vec<_> = pending_for([&newer, &tied, &older], &roles(&["qa"]))
            .into_iter()
            .map(|p| p.request_id.as_str().to_string())
            .collect();

        assert_eq!(listed, ["apr_1z", "apr_1a", "apr_1b"]);
    }
}
