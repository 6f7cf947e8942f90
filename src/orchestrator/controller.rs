//! Single-slot session controller.
//!
//! At most one engine process runs at a time. The slot lock is held across
//! the launch, so concurrent `start` calls serialize and every caller after
//! the first is rejected with [`AppError::SessionAlreadyActive`] instead of
//! replacing the running process.
//!
//! Each session gets a driver task that owns the [`ProcessHandle`], waits for
//! exit, cancellation or the runtime limit, drains buffered output, clears the
//! slot and finally resolves the caller's pending `start`.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::config::{GlobalConfig, TimeoutConfig};
use crate::models::outcome::{OutcomeKind, SessionOutcome};
use crate::models::session::{Session, SessionState};
use crate::orchestrator::coordinator::{ResultCoordinator, Termination};
use crate::orchestrator::interpreter::{self, StdoutSummary};
use crate::orchestrator::launcher::{self, LaunchSpec, ProcessHandle};
use crate::{AppError, Result};

type Slot = Arc<Mutex<Option<ActiveSession>>>;

/// Acknowledgement returned by [`SessionController::stop`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StopAck {
    /// Session the stop request was delivered to.
    pub session_id: String,
    /// `false` when the session was already ending for another reason; its
    /// outcome keeps that reason.
    pub cancelled: bool,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStatusView {
    /// `Idle` or `Running`; the slot stays `Running` until the engine exits.
    pub state: SessionState,
    /// How the running session is ending, once exit, stop or timeout has
    /// been claimed. The session's own state already shows the terminal value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending: Option<OutcomeKind>,
    /// The running session with its live feedback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

struct ActiveSession {
    session: Session,
    cancel: CancellationToken,
    coordinator: Arc<ResultCoordinator>,
    feedback: watch::Receiver<Option<String>>,
}

/// Owns the single session slot and its lifecycle.
pub struct SessionController {
    spec: LaunchSpec,
    timeouts: TimeoutConfig,
    stderr_tail_lines: usize,
    audit: Option<Arc<dyn AuditLogger>>,
    slot: Slot,
    state_tx: Arc<watch::Sender<SessionState>>,
}

impl SessionController {
    /// Build a controller from validated configuration.
    #[must_use]
    pub fn new(config: &GlobalConfig, audit: Option<Arc<dyn AuditLogger>>) -> Self {
        Self::with_spec(
            LaunchSpec::from_config(config),
            config.timeouts.clone(),
            config.diagnostics.stderr_tail_lines,
            audit,
        )
    }

    /// Build a controller around an explicit launch spec.
    #[must_use]
    pub fn with_spec(
        spec: LaunchSpec,
        timeouts: TimeoutConfig,
        stderr_tail_lines: usize,
        audit: Option<Arc<dyn AuditLogger>>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            spec,
            timeouts,
            stderr_tail_lines,
            audit,
            slot: Arc::new(Mutex::new(None)),
            state_tx: Arc::new(state_tx),
        }
    }

    /// Current slot state: `Idle` or `Running`.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Start a session and wait for its terminal outcome.
    ///
    /// # Errors
    ///
    /// - `AppError::SessionAlreadyActive` if a session is running.
    /// - `AppError::Launch` if the engine cannot be started; the slot stays idle.
    /// - `AppError::Session` if the driver ends without an outcome.
    pub async fn start(&self, user_id: &str, kind: Option<&str>) -> Result<SessionOutcome> {
        let span = info_span!("start_session", user_id, kind);
        async move {
            let rx = self.launch(user_id, kind).await?;
            rx.await
                .map_err(|_| AppError::Session("session driver ended without an outcome".into()))
        }
        .instrument(span)
        .await
    }

    /// Request cancellation of the running session.
    ///
    /// The engine is interrupted by the driver task; the pending `start`
    /// resolves with [`OutcomeKind::Cancelled`] once the process has exited.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` when idle; nothing is changed.
    pub async fn stop(&self) -> Result<StopAck> {
        let slot = self.slot.lock().await;
        let Some(active) = slot.as_ref() else {
            debug!("stop requested with no active session");
            return Err(AppError::NoActiveSession);
        };

        let cancelled = active.coordinator.claim(Termination::Cancelled);
        if cancelled {
            info!(session_id = %active.session.id, "stop requested");
        } else {
            info!(
                session_id = %active.session.id,
                cause = ?active.coordinator.cause(),
                "stop requested while session already ending"
            );
        }
        active.cancel.cancel();

        Ok(StopAck {
            session_id: active.session.id.clone(),
            cancelled,
        })
    }

    /// Snapshot the slot, including feedback captured so far.
    pub async fn status(&self) -> SessionStatusView {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            None => SessionStatusView {
                state: SessionState::Idle,
                ending: None,
                session: None,
            },
            Some(active) => {
                let mut session = active.session.clone();
                session.set_feedback(active.feedback.borrow().clone());
                let ending = active.coordinator.cause().map(Termination::outcome_kind);
                if let Some(kind) = ending {
                    session.state = kind.terminal_state();
                }
                SessionStatusView {
                    state: SessionState::Running,
                    ending,
                    session: Some(session),
                }
            }
        }
    }

    /// Wait until the slot is idle. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut rx = self.state_tx.subscribe();
        let idle = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| *s == SessionState::Idle)).await,
            Ok(Ok(_))
        );
        idle
    }

    /// Stop any running session and wait for the slot to drain.
    ///
    /// Returns `true` when the controller is idle on return.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        match self.stop().await {
            Ok(ack) => info!(session_id = %ack.session_id, "stopping session for shutdown"),
            Err(AppError::NoActiveSession) => return true,
            Err(err) => warn!(%err, "failed to stop session for shutdown"),
        }

        let idle = self.wait_idle(timeout).await;
        if !idle {
            warn!(?timeout, "session did not finish before shutdown deadline");
        }
        idle
    }

    /// Claim the slot and spawn the engine plus its driver.
    async fn launch(
        &self,
        user_id: &str,
        kind: Option<&str>,
    ) -> Result<tokio::sync::oneshot::Receiver<SessionOutcome>> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = slot.as_ref() {
            warn!(active_session = %active.session.id, "start rejected: session already active");
            return Err(AppError::SessionAlreadyActive(active.session.id.clone()));
        }

        let mut session = Session::new(user_id.to_owned(), kind.map(str::to_owned));

        let mut handle = match launcher::spawn(&self.spec, user_id, session.kind.as_deref()) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(%err, "engine launch failed");
                record(
                    self.audit.as_deref(),
                    AuditEntry::new(AuditEventType::LaunchFailure)
                        .with_user(session.user_id.clone(), session.kind.clone())
                        .with_message(err.to_string()),
                );
                return Err(err);
            }
        };

        session.pid = handle.pid();
        session.transition(SessionState::Running)?;

        let stdout = handle
            .stdout
            .take()
            .ok_or_else(|| AppError::Launch("engine stdout unavailable".into()))?;
        let stderr = handle
            .stderr
            .take()
            .ok_or_else(|| AppError::Launch("engine stderr unavailable".into()))?;

        let (feedback_tx, feedback_rx) = watch::channel(None);
        let stdout_task = tokio::spawn(
            interpreter::run_stdout(session.id.clone(), stdout, feedback_tx).in_current_span(),
        );
        let stderr_task = tokio::spawn(
            interpreter::run_stderr(session.id.clone(), stderr, self.stderr_tail_lines)
                .in_current_span(),
        );

        let (coordinator, rx) = ResultCoordinator::new();
        let coordinator = Arc::new(coordinator);
        let cancel = CancellationToken::new();

        record(
            self.audit.as_deref(),
            AuditEntry::new(AuditEventType::SessionStart)
                .with_session(session.id.clone())
                .with_user(session.user_id.clone(), session.kind.clone())
                .with_pid(session.pid),
        );
        info!(session_id = %session.id, pid = session.pid.unwrap_or(0), "session running");

        let driver = Driver {
            session: session.clone(),
            handle,
            stdout_task,
            stderr_task,
            feedback: feedback_rx.clone(),
            coordinator: Arc::clone(&coordinator),
            cancel: cancel.clone(),
            timeouts: self.timeouts.clone(),
            slot: Arc::clone(&self.slot),
            state_tx: Arc::clone(&self.state_tx),
            audit: self.audit.clone(),
        };
        let span = info_span!("session", session_id = %session.id, user_id = %session.user_id);
        tokio::spawn(driver.run().instrument(span));

        *slot = Some(ActiveSession {
            session,
            cancel,
            coordinator,
            feedback: feedback_rx,
        });
        self.state_tx.send_replace(SessionState::Running);

        Ok(rx)
    }
}

/// Per-session task owning the engine process.
struct Driver {
    session: Session,
    handle: ProcessHandle,
    stdout_task: JoinHandle<StdoutSummary>,
    stderr_task: JoinHandle<Vec<String>>,
    feedback: watch::Receiver<Option<String>>,
    coordinator: Arc<ResultCoordinator>,
    cancel: CancellationToken,
    timeouts: TimeoutConfig,
    slot: Slot,
    state_tx: Arc<watch::Sender<SessionState>>,
    audit: Option<Arc<dyn AuditLogger>>,
}

impl Driver {
    async fn run(mut self) {
        let exit = self.await_termination().await;
        let exit_code = exit.and_then(|status| status.code());

        // Output still buffered in the pipes is read before feedback is final.
        let drain = self.timeouts.drain();
        if let Some(summary) = join_bounded(&mut self.stdout_task, drain, "stdout").await {
            debug!(lines = summary.lines, feedback_lines = summary.feedback_lines, "stdout drained");
        }
        let stderr_tail = join_bounded(&mut self.stderr_task, drain, "stderr")
            .await
            .unwrap_or_default();

        let feedback = self.feedback.borrow().clone();
        let kind = self
            .coordinator
            .cause()
            .map_or(OutcomeKind::Finished, Termination::outcome_kind);

        self.session.set_feedback(feedback.clone());
        if let Err(err) = self.session.transition(kind.terminal_state()) {
            warn!(%err, "unexpected session transition");
        }

        let outcome = SessionOutcome::new(self.session.id.clone(), kind, feedback, exit_code)
            .with_stderr_tail(stderr_tail);

        self.release_slot().await;

        record(
            self.audit.as_deref(),
            AuditEntry::new(audit_event(kind))
                .with_session(self.session.id.clone())
                .with_user(self.session.user_id.clone(), self.session.kind.clone())
                .with_pid(self.session.pid)
                .with_exit_code(exit_code)
                .with_message(outcome.message.clone()),
        );

        info!(
            outcome = ?kind,
            exit_code = exit_code.unwrap_or(-1),
            message = %outcome.message,
            "session ended"
        );

        if !self.coordinator.resolve(outcome) {
            debug!("start caller no longer waiting for outcome");
        }
    }

    /// Wait for the first of exit, stop or runtime limit.
    async fn await_termination(&mut self) -> Option<ExitStatus> {
        let max_runtime = self.timeouts.max_runtime();
        let deadline = async move {
            match max_runtime {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            status = self.handle.wait() => {
                self.coordinator.claim(Termination::Exited);
                match status {
                    Ok(status) => {
                        info!(?status, "engine exited");
                        Some(status)
                    }
                    Err(err) => {
                        warn!(%err, "error waiting for engine");
                        None
                    }
                }
            }
            () = self.cancel.cancelled() => {
                info!("interrupting engine");
                self.terminate().await
            }
            () = deadline => {
                if self.coordinator.claim(Termination::TimedOut) {
                    warn!(?max_runtime, "engine exceeded maximum runtime, stopping");
                }
                self.terminate().await
            }
        }
    }

    /// Interrupt, wait out the grace period, then kill.
    async fn terminate(&mut self) -> Option<ExitStatus> {
        if let Err(err) = self.handle.interrupt() {
            warn!(%err, "failed to interrupt engine");
        }

        let grace = self.timeouts.stop_grace();
        match tokio::time::timeout(grace, self.handle.wait()).await {
            Ok(Ok(status)) => {
                info!(?status, "engine exited after interrupt");
                Some(status)
            }
            Ok(Err(err)) => {
                warn!(%err, "error waiting for interrupted engine");
                None
            }
            Err(_) => {
                warn!(?grace, "engine did not exit within grace period, forcing kill");
                if let Err(err) = self.handle.kill().await {
                    warn!(%err, "failed to force-kill engine");
                }
                match self.handle.wait().await {
                    Ok(status) => Some(status),
                    Err(err) => {
                        warn!(%err, "error reaping killed engine");
                        None
                    }
                }
            }
        }
    }

    async fn release_slot(&self) {
        let mut slot = self.slot.lock().await;
        if slot
            .as_ref()
            .is_some_and(|active| active.session.id == self.session.id)
        {
            *slot = None;
            self.state_tx.send_replace(SessionState::Idle);
        }
    }
}

/// Join a reader task, aborting it if it outlives `limit`.
async fn join_bounded<T>(task: &mut JoinHandle<T>, limit: Duration, stream: &str) -> Option<T> {
    match tokio::time::timeout(limit, &mut *task).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            warn!(stream, %err, "engine reader task failed");
            None
        }
        Err(_) => {
            // A grandchild may still hold the pipe open.
            warn!(stream, ?limit, "engine output not closed within drain window, abandoning");
            task.abort();
            None
        }
    }
}

fn audit_event(kind: OutcomeKind) -> AuditEventType {
    match kind {
        OutcomeKind::Finished => AuditEventType::SessionFinish,
        OutcomeKind::Cancelled => AuditEventType::SessionCancel,
        OutcomeKind::Timeout => AuditEventType::SessionTimeout,
    }
}

fn record(audit: Option<&dyn AuditLogger>, entry: AuditEntry) {
    if let Some(audit) = audit {
        if let Err(err) = audit.log_entry(entry) {
            warn!(%err, "failed to write audit entry");
        }
    }
}
