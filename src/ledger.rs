//! The ordered steps of one approval request
//!
//! Only the current step (the lowest-order step still pending) is addressable.
//! That single rule is what keeps approval strictly sequential: it is a pure
//! function of the ledger contents, so it needs no lock of its own.
use crate::error::EngineError;
use crate::step::{ApprovalStep, Decision, StepStatus};
use crate::types::{Role, TimeStamp};
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct StepLedger {
    #[n(0)]
    steps: Vec<ApprovalStep>,
}

impl StepLedger {
    /// One pending step per role, ordered from 1.
    pub fn new<I>(roles: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Role>,
    {
        let steps: Vec<ApprovalStep> = roles
            .into_iter()
            .zip(1u32..)
            .map(|(role, order)| ApprovalStep::pending(order, role))
            .collect();

        if steps.is_empty() {
            return Err(EngineError::EmptyStepList);
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[ApprovalStep] {
        &self.steps
    }
    pub fn len(&self) -> u32 {
        self.steps.len() as u32
    }
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
    pub fn step(&self, order: u32) -> Option<&ApprovalStep> {
        let index = order.checked_sub(1)? as usize;
        self.steps.get(index)
    }

    /// None when every step is approved or the ledger has halted.
    pub fn current_step(&self) -> Option<&ApprovalStep> {
        if self.is_halted() {
            return None;
        }
        self.steps
            .iter()
            .find(|step| step.status() == StepStatus::Pending)
    }

    pub fn is_halted(&self) -> bool {
        self.halted_step().is_some()
    }

    pub fn halted_step(&self) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.status().halts())
    }

    /// Returns a new ledger with the current step decided. `self` is left
    /// untouched, so a failed commit can simply drop the result.
    pub fn apply_decision(
        &self,
        step_order: u32,
        decision: &Decision,
        decided_at: TimeStamp<Utc>,
    ) -> Result<StepLedger, EngineError> {
        let current = self.current_step().ok_or(EngineError::NoActiveStep)?;
        if current.order() != step_order {
            return Err(EngineError::InvalidStepOrder {
                expected: current.order(),
                got: step_order,
            });
        }

        let mut next = self.clone();
        let index = (step_order - 1) as usize;
        next.steps[index].decide(decision, decided_at);

        Ok(next)
    }

    /// Clears the halted step back to pending. None if nothing is halted.
    pub fn reset_halted_step(&self) -> Option<StepLedger> {
        let index = self.steps.iter().position(|step| step.status().halts())?;

        let mut next = self.clone();
        next.steps[index].reset();

        Some(next)
    }

    /// Checks the shape every ledger produced by this module has: orders run
    /// 1..=N, statuses read `approved* halted? pending*`, and a decision
    /// record is present exactly on decided steps.
    pub fn is_well_formed(&self) -> bool {
        if self.steps.is_empty() {
            return false;
        }

        // 0: approved prefix, 1: after a halting step, 2: pending suffix
        let mut phase = 0;
        for (step, expected_order) in self.steps.iter().zip(1u32..) {
            if step.order() != expected_order {
                return false;
            }
            if step.status().is_decided() != step.decision().is_some() {
                return false;
            }
            phase = match (phase, step.status()) {
                (0, StepStatus::Approved) => 0,
                (0, status) if status.halts() => 1,
                (_, StepStatus::Pending) => 2,
                _ => return false,
            };
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Outcome;

    fn ledger(roles: &[&str]) -> StepLedger {
        StepLedger::new(roles.iter().map(|r| Role::from(*r))).unwrap()
    }

    fn decision(outcome: Outcome, role: &str) -> Decision {
        Decision {
            outcome,
            comment: None,
            principal_id: "user_1".into(),
            role: role.into(),
        }
    }

    #[test]
    fn empty_role_list_is_refused() {
        let result = StepLedger::new(Vec::new());
        assert!(matches!(result, Err(EngineError::EmptyStepList)));
    }

    #[test]
    fn first_step_is_current_on_creation() {
        let ledger = ledger(&["a", "b", "c"]);

        assert_eq!(ledger.current_step().map(ApprovalStep::order), Some(1));
        assert!(!ledger.is_halted());
        assert!(ledger.is_well_formed());
    }

    #[test]
    fn approval_advances_current_step() {
        let ledger = ledger(&["a", "b"]);

        let next = ledger
            .apply_decision(1, &decision(Outcome::Approve, "a"), TimeStamp::new())
            .unwrap();

        assert_eq!(next.current_step().map(ApprovalStep::order), Some(2));
        // original ledger is unchanged
        assert_eq!(ledger.current_step().map(ApprovalStep::order), Some(1));
    }

    #[test]
    fn skipping_ahead_is_invalid_step_order() {
        let ledger = ledger(&["a", "b"]);

        let result = ledger.apply_decision(2, &decision(Outcome::Approve, "b"), TimeStamp::new());

        assert!(matches!(
            result,
            Err(EngineError::InvalidStepOrder {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn revision_halts_until_reset() {
        let ledger = ledger(&["a", "b"]);

        let halted = ledger
            .apply_decision(1, &decision(Outcome::RequestRevision, "a"), TimeStamp::new())
            .unwrap();
        assert!(halted.is_halted());
        assert!(halted.current_step().is_none());
        assert!(matches!(
            halted.apply_decision(1, &decision(Outcome::Approve, "a"), TimeStamp::new()),
            Err(EngineError::NoActiveStep)
        ));

        let reset = halted.reset_halted_step().unwrap();
        assert_eq!(reset, ledger);
    }

    #[test]
    fn reset_without_halt_is_none() {
        assert!(ledger(&["a"]).reset_halted_step().is_none());
    }

    #[test]
    fn all_approved_has_no_current_step() {
        let ledger = ledger(&["a"])
            .apply_decision(1, &decision(Outcome::Approve, "a"), TimeStamp::new())
            .unwrap();

        assert!(ledger.current_step().is_none());
        assert!(!ledger.is_halted());
        assert!(ledger.is_well_formed());
    }

    #[test]
    fn out_of_range_step_lookup_is_none() {
        let ledger = ledger(&["a"]);
        assert!(ledger.step(0).is_none());
        assert!(ledger.step(2).is_none());
    }
}
