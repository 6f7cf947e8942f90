//! Single-resolution bridge between a session driver and its `start` caller.
//!
//! Two things are settled exactly once per session:
//!
//! 1. **Why** the session ended. Natural exit, `stop()` and the runtime limit
//!    all race to [`ResultCoordinator::claim`]; the first claim wins and later
//!    claims are discarded.
//! 2. **What** the caller receives. [`ResultCoordinator::resolve`] hands the
//!    outcome to the pending `start`; a second resolution is a no-op.

use std::sync::{Mutex, OnceLock};

use tokio::sync::oneshot;
use tracing::debug;

use crate::models::outcome::{OutcomeKind, SessionOutcome};

/// Cause of session termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The engine exited without being asked to.
    Exited,
    /// A caller invoked `stop()`.
    Cancelled,
    /// The maximum runtime elapsed.
    TimedOut,
}

impl Termination {
    /// Outcome classification reported to the caller.
    #[must_use]
    pub fn outcome_kind(self) -> OutcomeKind {
        match self {
            Self::Exited => OutcomeKind::Finished,
            Self::Cancelled => OutcomeKind::Cancelled,
            Self::TimedOut => OutcomeKind::Timeout,
        }
    }
}

/// Pending result for one in-flight `start` call.
#[derive(Debug)]
pub struct ResultCoordinator {
    cause: OnceLock<Termination>,
    tx: Mutex<Option<oneshot::Sender<SessionOutcome>>>,
}

impl ResultCoordinator {
    /// Create a coordinator and the receiver the `start` caller awaits.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<SessionOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                cause: OnceLock::new(),
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Record why the session is ending. Returns `true` if this claim won.
    pub fn claim(&self, cause: Termination) -> bool {
        let won = self.cause.set(cause).is_ok();
        if !won {
            debug!(?cause, winner = ?self.cause.get(), "termination claim lost");
        }
        won
    }

    /// The winning termination cause, if any claim has been made.
    #[must_use]
    pub fn cause(&self) -> Option<Termination> {
        self.cause.get().copied()
    }

    /// Deliver the outcome. Returns `true` if the caller received it.
    ///
    /// Returns `false` when the outcome was already delivered or the caller
    /// stopped waiting.
    pub fn resolve(&self, outcome: SessionOutcome) -> bool {
        let tx = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(tx) = tx else {
            debug!(session_id = %outcome.session_id, "outcome already resolved, discarding");
            return false;
        };

        tx.send(outcome).is_ok()
    }

    /// Whether the outcome has been handed off.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match self.tx.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}
