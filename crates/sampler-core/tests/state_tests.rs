use proptest::prelude::*;
use sampler_core::state_machine::{allowed_transitions, validate_transition};
use sampler_core::SearchPhase;

fn any_phase() -> impl Strategy<Value = SearchPhase> {
    prop_oneof![
        Just(SearchPhase::Idle),
        Just(SearchPhase::Searching),
        Just(SearchPhase::Resolved),
        Just(SearchPhase::Failed),
        Just(SearchPhase::Cancelled),
    ]
}

#[test]
fn test_searching_transitions() {
    assert!(validate_transition(SearchPhase::Searching, SearchPhase::Resolved).is_ok());
    assert!(validate_transition(SearchPhase::Searching, SearchPhase::Failed).is_ok());
    assert!(validate_transition(SearchPhase::Searching, SearchPhase::Cancelled).is_ok());

    assert!(validate_transition(SearchPhase::Searching, SearchPhase::Idle).is_err());
}

#[test]
fn test_idle_cannot_resolve_directly() {
    assert!(validate_transition(SearchPhase::Idle, SearchPhase::Resolved).is_err());
}

#[test]
fn test_transition_error_message() {
    let err = validate_transition(SearchPhase::Resolved, SearchPhase::Searching).unwrap_err();
    assert_eq!(err.to_string(), "illegal search transition Resolved -> Searching");
}

proptest! {
    #[test]
    fn prop_transitions_match_allowed(from in any_phase(), to in any_phase()) {
        let allowed = allowed_transitions(from);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed.contains(&to));
    }

    #[test]
    fn prop_terminal_phases_have_no_exit(from in any_phase(), to in any_phase()) {
        if from.is_terminal() {
            prop_assert!(validate_transition(from, to).is_err());
        }
    }
}
