use focus_orchestrator::models::session::{Session, SessionState};
use focus_orchestrator::AppError;

#[test]
fn new_session_is_idle_with_identity() {
    let session = Session::new("42".into(), Some("engineer".into()));

    assert_eq!(session.state, SessionState::Idle);
    assert_eq!(session.user_id, "42");
    assert_eq!(session.kind.as_deref(), Some("engineer"));
    assert!(session.feedback.is_none());
    assert!(session.pid.is_none());
    assert!(uuid::Uuid::parse_str(&session.id).is_ok());
}

#[test]
fn blank_kind_is_treated_as_absent() {
    let session = Session::new("42".into(), Some("   ".into()));
    assert!(session.kind.is_none());
}

#[test]
fn sessions_get_unique_ids() {
    let a = Session::new("42".into(), None);
    let b = Session::new("42".into(), None);
    assert_ne!(a.id, b.id);
}

#[test]
fn idle_may_only_move_to_running() {
    let session = Session::new("42".into(), None);

    assert!(session.can_transition_to(SessionState::Running));
    assert!(!session.can_transition_to(SessionState::Finished));
    assert!(!session.can_transition_to(SessionState::Cancelled));
    assert!(!session.can_transition_to(SessionState::TimedOut));
}

#[test]
fn running_ends_exactly_once() {
    for terminal in [
        SessionState::Finished,
        SessionState::Cancelled,
        SessionState::TimedOut,
    ] {
        let mut session = Session::new("42".into(), None);
        session.transition(SessionState::Running).expect("start");
        session.transition(terminal).expect("terminal transition");
        assert!(session.state.is_terminal());

        let err = session
            .transition(SessionState::Cancelled)
            .expect_err("second terminal transition rejected");
        assert!(matches!(err, AppError::Session(_)));
        assert_eq!(session.state, terminal, "failed transition leaves state unchanged");
    }
}

#[test]
fn running_is_not_terminal() {
    assert!(!SessionState::Idle.is_terminal());
    assert!(!SessionState::Running.is_terminal());
}

#[test]
fn feedback_is_never_set_empty() {
    let mut session = Session::new("42".into(), None);

    session.set_feedback(Some(String::new()));
    assert!(session.feedback.is_none());

    session.set_feedback(Some("halfway".into()));
    session.set_feedback(Some("final score 88".into()));
    assert_eq!(session.feedback.as_deref(), Some("final score 88"));

    session.set_feedback(None);
    assert_eq!(session.feedback.as_deref(), Some("final score 88"));
}

#[test]
fn state_serializes_snake_case() {
    let json = serde_json::to_string(&SessionState::TimedOut).expect("serialize");
    assert_eq!(json, r#""timed_out""#);
}
