//! Global configuration parsing and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Environment variable forced on every engine launch so the child emits
/// UTF-8 regardless of the host locale.
pub const UTF8_ENV_VAR: &str = "PYTHONIOENCODING";

/// Analysis engine invocation settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Runtime executable (e.g., `python3` or an absolute interpreter path).
    pub runtime: String,
    /// Entry script passed as the first argument; relative paths resolve
    /// against `work_dir`.
    pub script_path: PathBuf,
    /// Engine root; the child process starts in this directory.
    pub work_dir: PathBuf,
    /// Arguments appended after the user id and kind.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Environment overrides layered on the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Timeout values (seconds) governing session termination.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Maximum session runtime before auto-cancel; 0 means no limit.
    #[serde(default)]
    pub max_runtime_seconds: u64,
    /// Time between the interrupt signal and a forced kill.
    #[serde(default = "default_stop_grace_seconds")]
    pub stop_grace_seconds: u64,
    /// Upper bound on draining buffered output after the process exits; must
    /// be non-zero so output still in the pipes is read.
    #[serde(default = "default_drain_seconds")]
    pub drain_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            max_runtime_seconds: 0,
            stop_grace_seconds: default_stop_grace_seconds(),
            drain_seconds: default_drain_seconds(),
        }
    }
}

impl TimeoutConfig {
    /// Maximum runtime, or `None` when unlimited.
    #[must_use]
    pub fn max_runtime(&self) -> Option<Duration> {
        (self.max_runtime_seconds > 0).then(|| Duration::from_secs(self.max_runtime_seconds))
    }

    /// Grace period between interrupt and kill.
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }

    /// Bound on output draining after exit.
    #[must_use]
    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_seconds)
    }
}

fn default_stop_grace_seconds() -> u64 {
    5
}

fn default_drain_seconds() -> u64 {
    5
}

/// Diagnostic capture settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DiagnosticsConfig {
    /// Number of trailing stderr lines attached to each outcome.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
    /// Directory for JSONL audit logs; auditing is disabled when absent.
    #[serde(default)]
    pub audit_dir: Option<PathBuf>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            stderr_tail_lines: default_stderr_tail_lines(),
            audit_dir: None,
        }
    }
}

fn default_stderr_tail_lines() -> usize {
    20
}

fn default_ipc_name() -> String {
    "focus-orchestrator".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Named pipe / Unix socket identifier.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Analysis engine invocation.
    pub engine: EngineConfig,
    /// Termination timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Diagnostic capture and audit settings.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the engine root and re-resolve the script path against it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory does not exist.
    pub fn override_work_dir(&mut self, work_dir: &Path) -> Result<()> {
        self.engine.work_dir = work_dir.to_path_buf();
        self.validate()
    }

    /// Script path as passed to the runtime.
    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        if self.engine.script_path.is_absolute() {
            self.engine.script_path.clone()
        } else {
            self.engine.work_dir.join(&self.engine.script_path)
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.engine.runtime.trim().is_empty() {
            return Err(AppError::Config("engine.runtime must not be empty".into()));
        }

        if self.engine.script_path.as_os_str().is_empty() {
            return Err(AppError::Config(
                "engine.script_path must not be empty".into(),
            ));
        }

        if self.timeouts.stop_grace_seconds == 0 {
            return Err(AppError::Config(
                "stop_grace_seconds must be greater than zero".into(),
            ));
        }

        if self.timeouts.drain_seconds == 0 {
            return Err(AppError::Config(
                "drain_seconds must be greater than zero".into(),
            ));
        }

        if self.ipc_name.trim().is_empty() {
            return Err(AppError::Config("ipc_name must not be empty".into()));
        }

        let canonical_root = self
            .engine
            .work_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("engine.work_dir invalid: {err}")))?;
        if !canonical_root.is_dir() {
            return Err(AppError::Config(format!(
                "engine.work_dir is not a directory: {}",
                canonical_root.display()
            )));
        }
        self.engine.work_dir = canonical_root;

        Ok(())
    }
}
