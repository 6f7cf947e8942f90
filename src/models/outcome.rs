//! Terminal outcome payload returned to `start` callers.

use serde::{Deserialize, Serialize};

use super::session::SessionState;

/// Message used when the engine never emitted a feedback marker.
pub const DEFAULT_FEEDBACK: &str = "Analysis completed.";

/// How a session ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The engine exited on its own.
    Finished,
    /// A caller stopped the session.
    Cancelled,
    /// The session exceeded its maximum runtime and was stopped.
    Timeout,
}

impl OutcomeKind {
    /// Terminal session state corresponding to this outcome.
    #[must_use]
    pub fn terminal_state(self) -> SessionState {
        match self {
            Self::Finished => SessionState::Finished,
            Self::Cancelled => SessionState::Cancelled,
            Self::Timeout => SessionState::TimedOut,
        }
    }
}

/// Result delivered exactly once per `start` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    /// Session the outcome belongs to.
    pub session_id: String,
    /// Terminal classification.
    pub outcome: OutcomeKind,
    /// Last feedback text, or [`DEFAULT_FEEDBACK`].
    pub message: String,
    /// Process exit code; absent when the process died from a signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Trailing stderr lines captured for diagnostics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr_tail: Vec<String>,
}

impl SessionOutcome {
    /// Build an outcome, falling back to [`DEFAULT_FEEDBACK`] when no
    /// feedback was captured.
    #[must_use]
    pub fn new(
        session_id: String,
        outcome: OutcomeKind,
        feedback: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self {
            session_id,
            outcome,
            message: feedback.unwrap_or_else(|| DEFAULT_FEEDBACK.to_owned()),
            exit_code,
            stderr_tail: Vec::new(),
        }
    }

    /// Attach trailing stderr lines.
    #[must_use]
    pub fn with_stderr_tail(mut self, tail: Vec<String>) -> Self {
        self.stderr_tail = tail;
        self
    }

    /// Whether the engine ran to completion with a zero exit code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == OutcomeKind::Finished && self.exit_code == Some(0)
    }
}
