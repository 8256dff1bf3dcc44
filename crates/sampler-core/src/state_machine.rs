//! Search lifecycle
//!
//! `Idle → Searching → {Resolved, Failed, Cancelled}`. Validation failures
//! and cancellation may also happen straight from `Idle`.

use crate::error::TransitionError;
use serde::{Deserialize, Serialize};

/// Phase of one search invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchPhase {
    /// Not started, or inputs incomplete
    Idle,
    /// Trials in progress
    Searching,
    /// Every branch resolved
    Resolved,
    /// Terminated with an error
    Failed,
    /// Stopped by the consumer
    Cancelled,
}

impl SearchPhase {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

/// Validates a phase transition
///
/// # Errors
/// [`TransitionError`] if `to` is not reachable from `from`.
pub fn validate_transition(from: SearchPhase, to: SearchPhase) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Phases reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SearchPhase) -> Vec<SearchPhase> {
    use SearchPhase::*;
    match from {
        Idle => vec![Searching, Failed, Cancelled],
        Searching => vec![Resolved, Failed, Cancelled],
        Resolved | Failed | Cancelled => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SearchPhase::*;

    #[test]
    fn idle_transitions() {
        assert!(validate_transition(Idle, Searching).is_ok());
        assert!(validate_transition(Idle, Failed).is_ok());
        assert!(validate_transition(Idle, Cancelled).is_ok());
        assert!(validate_transition(Idle, Resolved).is_err());
    }

    #[test]
    fn terminal_phases_are_final() {
        for phase in [Resolved, Failed, Cancelled] {
            assert!(phase.is_terminal());
            assert!(validate_transition(phase, Searching).is_err());
        }
        assert!(!Idle.is_terminal());
        assert!(!Searching.is_terminal());
    }
}
