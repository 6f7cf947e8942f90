//! Engine output interpreter.
//!
//! Reads the engine's stdout line by line and publishes the latest feedback
//! marker payload through a [`watch`] channel. Stderr is drained separately
//! into a bounded diagnostic tail.
//!
//! # Output protocol
//!
//! | Line                          | Effect                                   |
//! |-------------------------------|------------------------------------------|
//! | contains `AI_MSG:<text>`      | feedback := trimmed text after the first marker |
//! | contains `AI_MSG:` with blank text | ignored                             |
//! | anything else                 | logged at `DEBUG`, no state change       |

use std::collections::VecDeque;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::orchestrator::launcher::OutputLines;

/// Line prefix announcing analysis feedback.
pub const FEEDBACK_MARKER: &str = "AI_MSG:";

/// Extract the feedback payload from a single output line.
///
/// Returns the trimmed text after the first [`FEEDBACK_MARKER`], or `None`
/// when the line carries no marker or the payload is blank.
#[must_use]
pub fn extract_feedback(line: &str) -> Option<&str> {
    let (_, payload) = line.split_once(FEEDBACK_MARKER)?;
    let payload = payload.trim();
    (!payload.is_empty()).then_some(payload)
}

/// Feedback produced by a complete sequence of lines: the last marker wins.
pub fn last_feedback<'a, I>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(extract_feedback)
        .last()
        .map(str::to_owned)
}

/// Counters reported when a stdout stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StdoutSummary {
    /// Total lines read.
    pub lines: u64,
    /// Lines that carried a feedback marker.
    pub feedback_lines: u64,
}

/// Drain engine stdout until EOF, publishing each feedback payload.
///
/// Every marker overwrites the previous value in `feedback`. Read errors end
/// the stream early and are logged; they never fail the session.
pub async fn run_stdout<R>(
    session_id: String,
    mut lines: OutputLines<R>,
    feedback: watch::Sender<Option<String>>,
) -> StdoutSummary
where
    R: AsyncRead + Unpin + Send,
{
    let mut summary = StdoutSummary::default();

    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => {
                summary.lines += 1;
                if let Some(text) = extract_feedback(&line) {
                    summary.feedback_lines += 1;
                    info!(session_id, feedback = text, "engine feedback captured");
                    feedback.send_replace(Some(text.to_owned()));
                } else {
                    debug!(session_id, line = %line, "engine output");
                }
            }
            Err(err) => {
                warn!(session_id, %err, "engine stdout read error, stopping");
                break;
            }
        }
    }

    debug!(
        session_id,
        lines = summary.lines,
        feedback_lines = summary.feedback_lines,
        "engine stdout closed"
    );
    summary
}

/// Drain engine stderr until EOF, keeping the last `tail_len` lines.
pub async fn run_stderr<R>(session_id: String, mut lines: OutputLines<R>, tail_len: usize) -> Vec<String>
where
    R: AsyncRead + Unpin + Send,
{
    let mut tail = VecDeque::with_capacity(tail_len);

    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => {
                warn!(session_id, line = %line, "engine stderr");
                if tail_len == 0 {
                    continue;
                }
                if tail.len() == tail_len {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(err) => {
                warn!(session_id, %err, "engine stderr read error, stopping");
                break;
            }
        }
    }

    tail.into()
}
