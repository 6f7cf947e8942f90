//! Session orchestration modules.
//!
//! Covers engine process launching, output interpretation, single-slot
//! session control, and delivery of each session's terminal outcome.

pub mod codec;
pub mod controller;
pub mod coordinator;
pub mod interpreter;
pub mod launcher;

pub use controller::{SessionController, SessionStatusView, StopAck};
