//! Run state machine
//!
//! Every transition of the refinement loop goes through this module so that
//! termination can be audited in one place.

use serde::{Deserialize, Serialize};

use crate::types::{StopReason, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    StoppedSufficient,
    StoppedBudget,
    StoppedStalled,
    StoppedInvalid,
    StoppedFailed,
    StoppedCancelled,
}

impl RunState {
    /// Decision after a completed round.
    ///
    /// Precedence: sufficient verdict, then budget, then stall.
    pub fn after_round(
        self,
        verdict: Verdict,
        iteration: u32,
        max_iterations: u32,
        stalled: bool,
    ) -> Self {
        if self != Self::Running {
            return self;
        }

        if verdict == Verdict::Sufficient {
            Self::StoppedSufficient
        } else if iteration >= max_iterations {
            Self::StoppedBudget
        } else if stalled {
            Self::StoppedStalled
        } else {
            Self::Running
        }
    }

    /// Cancellation only takes effect on a run that would otherwise continue
    pub fn at_boundary(self, cancelled: bool) -> Self {
        match self {
            Self::Running if cancelled => Self::StoppedCancelled,
            other => other,
        }
    }

    /// Preconditions failed; the loop never starts
    pub fn on_invalid_input(self) -> Self {
        match self {
            Self::Running => Self::StoppedInvalid,
            other => other,
        }
    }

    /// A delegate call gave up after exhausting its retries
    pub fn on_delegate_failure(self) -> Self {
        match self {
            Self::Running => Self::StoppedFailed,
            other => other,
        }
    }

    /// Stop reason of a terminal state; `None` while running
    pub fn stop_reason(self) -> Option<StopReason> {
        match self {
            Self::Running => None,
            Self::StoppedSufficient => Some(StopReason::CriticSufficient),
            Self::StoppedBudget => Some(StopReason::BudgetExhausted),
            Self::StoppedStalled => Some(StopReason::NoProgress),
            Self::StoppedInvalid => Some(StopReason::InputInvalid),
            Self::StoppedFailed => Some(StopReason::DelegateFailed),
            Self::StoppedCancelled => Some(StopReason::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [RunState; 7] = [
        RunState::Running,
        RunState::StoppedSufficient,
        RunState::StoppedBudget,
        RunState::StoppedStalled,
        RunState::StoppedInvalid,
        RunState::StoppedFailed,
        RunState::StoppedCancelled,
    ];

    #[test]
    fn test_sufficient_wins_over_budget_and_stall() {
        let next = RunState::Running.after_round(Verdict::Sufficient, 3, 3, true);
        assert_eq!(next, RunState::StoppedSufficient);
    }

    #[test]
    fn test_budget_wins_over_stall() {
        let next = RunState::Running.after_round(Verdict::NeedsMoreEvidence, 3, 3, true);
        assert_eq!(next, RunState::StoppedBudget);
    }

    #[test]
    fn test_stall_before_budget() {
        let next = RunState::Running.after_round(Verdict::NeedsCorrection, 2, 5, true);
        assert_eq!(next, RunState::StoppedStalled);
    }

    #[test]
    fn test_continue_when_progressing() {
        let next = RunState::Running.after_round(Verdict::NeedsMoreEvidence, 1, 5, false);
        assert_eq!(next, RunState::Running);
    }

    #[test]
    fn test_cancellation_only_stops_running_state() {
        assert_eq!(RunState::Running.at_boundary(true), RunState::StoppedCancelled);
        assert_eq!(RunState::Running.at_boundary(false), RunState::Running);
        assert_eq!(
            RunState::StoppedSufficient.at_boundary(true),
            RunState::StoppedSufficient
        );
    }

    #[test]
    fn test_failures_from_running() {
        assert_eq!(RunState::Running.on_invalid_input(), RunState::StoppedInvalid);
        assert_eq!(RunState::Running.on_delegate_failure(), RunState::StoppedFailed);
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for state in ALL_STATES.into_iter().filter(|s| s.stop_reason().is_some()) {
            assert_eq!(state.after_round(Verdict::NeedsMoreEvidence, 1, 5, false), state);
            assert_eq!(state.at_boundary(true), state);
            assert_eq!(state.on_delegate_failure(), state);
            assert_eq!(state.on_invalid_input(), state);
        }
    }

    #[test]
    fn test_every_terminal_state_has_distinct_reason() {
        let reasons: Vec<StopReason> = ALL_STATES
            .into_iter()
            .filter_map(RunState::stop_reason)
            .collect();
        assert_eq!(reasons.len(), 6);
        for (i, a) in reasons.iter().enumerate() {
            for b in &reasons[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(RunState::Running.stop_reason(), None);
    }
}
