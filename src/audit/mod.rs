//! Structured audit logging for session lifecycle events.
//!
//! Provides the [`AuditLogger`] trait and associated types. The primary
//! implementation, [`JsonlAuditWriter`], appends JSONL records to
//! daily-rotating files in the configured audit directory.

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type classification for audit log entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Engine process launched for a session.
    SessionStart,
    /// Engine exited on its own.
    SessionFinish,
    /// Session stopped by a caller.
    SessionCancel,
    /// Session stopped after exceeding its maximum runtime.
    SessionTimeout,
    /// Engine executable could not be started.
    LaunchFailure,
}

/// A structured record of a session lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// ISO 8601 timestamp with timezone.
    pub timestamp: DateTime<Utc>,
    /// Event classification.
    pub event_type: AuditEventType,
    /// Associated session identifier (absent for launch failures).
    pub session_id: Option<String>,
    /// User the session runs for.
    pub user_id: Option<String>,
    /// Session kind tag.
    pub kind: Option<String>,
    /// Engine process id.
    pub pid: Option<u32>,
    /// Engine exit code.
    pub exit_code: Option<i32>,
    /// Feedback message or failure description.
    pub message: Option<String>,
}

impl AuditEntry {
    /// Construct a minimal audit entry for the given event type.
    #[must_use]
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            session_id: None,
            user_id: None,
            kind: None,
            pid: None,
            exit_code: None,
            message: None,
        }
    }

    /// Set the session identifier for this entry.
    #[must_use]
    pub fn with_session(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Set the user and optional kind for this entry.
    #[must_use]
    pub fn with_user(mut self, user_id: String, kind: Option<String>) -> Self {
        self.user_id = Some(user_id);
        self.kind = kind;
        self
    }

    /// Set the engine process id for this entry.
    #[must_use]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Set the engine exit code for this entry.
    #[must_use]
    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Set the message for this entry.
    #[must_use]
    pub fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

/// Writes structured audit entries to a persistent store.
///
/// Implementations must be [`Send`] and [`Sync`] to allow sharing across
/// async task boundaries via [`std::sync::Arc`].
pub trait AuditLogger: Send + Sync {
    /// Record a single audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write operation fails.
    fn log_entry(&self, entry: AuditEntry) -> crate::Result<()>;
}

pub use writer::JsonlAuditWriter;
