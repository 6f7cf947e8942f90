//! Session model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Lifecycle state of a learning session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No process running; the slot is free.
    Idle,
    /// The analysis engine is running.
    Running,
    /// The engine exited on its own.
    Finished,
    /// The session was stopped by a caller.
    Cancelled,
    /// The session exceeded its maximum runtime.
    TimedOut,
}

impl SessionState {
    /// Whether this state ends the session.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::TimedOut)
    }
}

/// One run of the analysis engine on behalf of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// Owning user identifier; immutable after creation.
    pub user_id: String,
    /// Optional category tag forwarded to the engine.
    pub kind: Option<String>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Last feedback captured from the engine; never empty when set.
    pub feedback: Option<String>,
    /// Creation timestamp.
    pub started_at: DateTime<Utc>,
    /// OS process id of the engine once launched.
    pub pid: Option<u32>,
}

impl Session {
    /// Construct an idle session with a generated identifier.
    ///
    /// A blank `kind` is treated as absent.
    #[must_use]
    pub fn new(user_id: String, kind: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            kind: kind.filter(|k| !k.trim().is_empty()),
            state: SessionState::Idle,
            feedback: None,
            started_at: Utc::now(),
            pid: None,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self.state, next),
            (SessionState::Idle, SessionState::Running)
                | (
                    SessionState::Running,
                    SessionState::Finished | SessionState::Cancelled | SessionState::TimedOut
                )
        )
    }

    /// Apply a lifecycle transition.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the transition is not permitted.
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(AppError::Session(format!(
                "invalid transition {:?} -> {next:?} for session {}",
                self.state, self.id
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Record captured feedback, ignoring blank text.
    pub fn set_feedback(&mut self, text: Option<String>) {
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.feedback = Some(text);
        }
    }
}
