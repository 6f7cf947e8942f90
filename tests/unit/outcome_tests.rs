use focus_orchestrator::models::outcome::{OutcomeKind, SessionOutcome, DEFAULT_FEEDBACK};
use focus_orchestrator::models::session::SessionState;

#[test]
fn finished_payload_matches_wire_shape() {
    let outcome = SessionOutcome::new(
        "s-1".into(),
        OutcomeKind::Finished,
        Some("final score 88".into()),
        Some(0),
    );

    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!({
            "sessionId": "s-1",
            "outcome": "finished",
            "message": "final score 88",
            "exitCode": 0,
        })
    );
    assert!(outcome.is_success());
}

#[test]
fn missing_feedback_uses_default_message() {
    let outcome = SessionOutcome::new("s-1".into(), OutcomeKind::Finished, None, Some(0));
    assert_eq!(outcome.message, DEFAULT_FEEDBACK);
    assert_eq!(outcome.message, "Analysis completed.");
}

#[test]
fn cancelled_without_exit_code_omits_field() {
    let outcome = SessionOutcome::new(
        "s-2".into(),
        OutcomeKind::Cancelled,
        Some("halfway".into()),
        None,
    );

    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["outcome"], "cancelled");
    assert_eq!(json["message"], "halfway");
    assert!(json.get("exitCode").is_none());
    assert!(json.get("stderrTail").is_none());
    assert!(!outcome.is_success());
}

#[test]
fn nonzero_exit_is_not_success() {
    let outcome = SessionOutcome::new("s-3".into(), OutcomeKind::Finished, None, Some(2));
    assert!(!outcome.is_success());
}

#[test]
fn stderr_tail_serialized_when_present() {
    let outcome = SessionOutcome::new("s-4".into(), OutcomeKind::Timeout, None, None)
        .with_stderr_tail(vec!["camera not found".into()]);

    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["outcome"], "timeout");
    assert_eq!(json["stderrTail"], serde_json::json!(["camera not found"]));

    let back: SessionOutcome = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, outcome);
}

#[test]
fn outcome_kinds_map_to_terminal_states() {
    assert_eq!(OutcomeKind::Finished.terminal_state(), SessionState::Finished);
    assert_eq!(OutcomeKind::Cancelled.terminal_state(), SessionState::Cancelled);
    assert_eq!(OutcomeKind::Timeout.terminal_state(), SessionState::TimedOut);
}
