use chrono::Utc;
use sync_core::{update, ControllerState, Msg, ScriptEvent};

#[test]
fn update_is_noop() {
    let state = ControllerState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp, Utc::now());

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn script_events_without_session_are_ignored() {
    let state = ControllerState::new();
    let (next, effects) = update(
        state.clone(),
        Msg::Script(ScriptEvent::Complete {
            message: "done".to_string(),
            total: 3,
        }),
        Utc::now(),
    );

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
