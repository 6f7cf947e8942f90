//! Analysis engine launcher.
//!
//! Builds the engine invocation and spawns it with piped stdout/stderr and
//! `kill_on_drop(true)`. The child inherits the server's environment with the
//! configured overrides layered on top; [`UTF8_ENV_VAR`] is always forced to
//! `utf-8` so feedback text survives non-UTF-8 host locales.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::codec::FramedRead;
use tracing::{debug, info};

use crate::config::{GlobalConfig, UTF8_ENV_VAR};
use crate::orchestrator::codec::LineCodec;
use crate::{AppError, Result};

/// Lazily decoded line stream over a child output pipe.
pub type OutputLines<R> = FramedRead<R, LineCodec>;

/// Everything needed to start the engine, independent of any one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Runtime executable.
    pub runtime: String,
    /// Entry script, always the first argument.
    pub script_path: PathBuf,
    /// Working directory for the child.
    pub work_dir: PathBuf,
    /// Arguments appended after the user id and kind.
    pub extra_args: Vec<String>,
    /// Environment overrides; [`UTF8_ENV_VAR`] is applied last.
    pub env_overrides: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Derive the launch spec from validated configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            runtime: config.engine.runtime.clone(),
            script_path: config.script_path(),
            work_dir: config.engine.work_dir.clone(),
            extra_args: config.engine.extra_args.clone(),
            env_overrides: config.engine.env.clone(),
        }
    }

    /// Argument vector passed to the runtime: `[script, user_id, kind?, extra...]`.
    #[must_use]
    pub fn args(&self, user_id: &str, kind: Option<&str>) -> Vec<OsString> {
        let mut args = vec![self.script_path.clone().into_os_string(), user_id.into()];
        if let Some(kind) = kind.filter(|k| !k.is_empty()) {
            args.push(kind.into());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    /// Effective environment overrides including the forced UTF-8 setting.
    #[must_use]
    pub fn env(&self) -> BTreeMap<String, String> {
        let mut env = self.env_overrides.clone();
        env.insert(UTF8_ENV_VAR.to_owned(), "utf-8".to_owned());
        env
    }
}

/// Live engine process owned by a single session.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    /// Engine stdout as lines; `None` once taken by the interpreter.
    pub stdout: Option<OutputLines<ChildStdout>>,
    /// Engine stderr as lines; `None` once taken for diagnostics.
    pub stderr: Option<OutputLines<ChildStderr>>,
}

impl ProcessHandle {
    /// OS process id captured at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the process to exit. Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the exit status cannot be collected.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.child
            .wait()
            .await
            .map_err(|err| AppError::Io(format!("failed to wait for engine: {err}")))
    }

    /// Ask the engine to stop.
    ///
    /// Sends `SIGINT` on Unix so the engine can flush its final feedback; on
    /// other platforms there is no cooperative signal and the process is
    /// killed outright.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the signal cannot be delivered.
    pub fn interrupt(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let Some(pid) = self.pid else {
                return Ok(());
            };
            let raw = i32::try_from(pid)
                .map_err(|_| AppError::Io(format!("pid {pid} out of range")))?;
            match kill(Pid::from_raw(raw), Signal::SIGINT) {
                // Already gone; the exit status is collected by `wait`.
                Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
                Err(err) => Err(AppError::Io(format!("failed to interrupt engine: {err}"))),
            }
        }

        #[cfg(not(unix))]
        {
            self.child
                .start_kill()
                .map_err(|err| AppError::Io(format!("failed to stop engine: {err}")))
        }
    }

    /// Forcefully kill the engine and reap it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the kill fails.
    pub async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .map_err(|err| AppError::Io(format!("failed to kill engine: {err}")))
    }
}

/// Spawn the analysis engine for a user.
///
/// # Errors
///
/// Returns `AppError::Launch` if the runtime cannot be started (missing
/// binary, permission denied, bad working directory) or its pipes cannot be
/// captured.
pub fn spawn(spec: &LaunchSpec, user_id: &str, kind: Option<&str>) -> Result<ProcessHandle> {
    let args = spec.args(user_id, kind);

    let mut cmd = Command::new(&spec.runtime);
    cmd.args(&args)
        .envs(spec.env())
        .current_dir(&spec.work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(runtime = %spec.runtime, ?args, work_dir = %spec.work_dir.display(), "spawning engine");

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Launch(format!("failed to spawn {}: {err}", spec.runtime))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture engine stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture engine stderr".into()))?;

    let pid = child.id();
    info!(pid = pid.unwrap_or(0), user_id, kind, runtime = %spec.runtime, "engine process spawned");

    Ok(ProcessHandle {
        child,
        pid,
        stdout: Some(FramedRead::new(stdout, LineCodec::new())),
        stderr: Some(FramedRead::new(stderr, LineCodec::new())),
    })
}
