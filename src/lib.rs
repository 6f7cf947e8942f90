#![forbid(unsafe_code)]

//! Supervisor for external focus-analysis engine sessions.
//!
//! Starts one engine process at a time on behalf of a learning session,
//! watches its stdout for `AI_MSG:` feedback, supports early stop, and
//! reports a single terminal outcome per session.

pub mod audit;
pub mod config;
pub mod errors;
pub mod ipc;
pub mod models;
pub mod orchestrator;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
