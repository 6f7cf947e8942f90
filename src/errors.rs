//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The analysis engine executable could not be started.
    Launch(String),
    /// A session is already running; the start request was rejected.
    SessionAlreadyActive(String),
    /// No session is running; the stop request was rejected.
    NoActiveSession,
    /// The session driver ended without delivering an outcome.
    Session(String),
    /// IPC communication failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Stable machine-readable code reported to IPC clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Launch(_) => "launch_failure",
            Self::SessionAlreadyActive(_) => "session_already_active",
            Self::NoActiveSession => "no_active_session",
            Self::Session(_) => "session",
            Self::Ipc(_) => "ipc",
            Self::Io(_) => "io",
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Launch(msg) => write!(f, "launch failure: {msg}"),
            Self::SessionAlreadyActive(id) => write!(f, "session already active: {id}"),
            Self::NoActiveSession => write!(f, "no active session"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
