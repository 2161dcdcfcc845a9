//! Role eligibility for recording a decision on a step
use crate::step::ApprovalStep;
use crate::types::Role;
use std::collections::BTreeSet;

/// True iff the principal holds the step's required role. There is no
/// wildcard or superuser bypass here, callers that want one must pre-filter.
pub fn is_eligible(principal_roles: &BTreeSet<Role>, step: &ApprovalStep) -> bool {
    principal_roles.contains(step.required_role())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> BTreeSet<Role> {
        names.iter().map(|n| Role::from(*n)).collect()
    }

    #[test]
    fn holder_of_required_role_is_eligible() {
        let step = ApprovalStep::pending(1, "qa".into());
        assert!(is_eligible(&roles(&["engineer", "qa"]), &step));
    }

    #[test]
    fn no_implicit_admin_bypass() {
        let step = ApprovalStep::pending(1, "qa".into());
        assert!(!is_eligible(&roles(&["admin", "*"]), &step));
        assert!(!is_eligible(&BTreeSet::new(), &step));
    }

    #[test]
    fn role_match_is_exact() {
        let step = ApprovalStep::pending(1, "qa".into());
        assert!(!is_eligible(&roles(&["QA"]), &step));
    }
}
