//! JSONL audit log writer with daily file rotation.

use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{NaiveDate, Utc};
use tracing::warn;

use super::{AuditEntry, AuditLogger};
use crate::{AppError, Result};

struct WriterState {
    current_date: NaiveDate,
    writer: BufWriter<fs::File>,
}

/// A daily-rotating JSONL audit log writer.
///
/// Appends one JSON object per line to `<log_dir>/audit-YYYY-MM-DD.jsonl`
/// and opens a new file when the UTC date changes between writes.
pub struct JsonlAuditWriter {
    log_dir: PathBuf,
    state: Mutex<Option<WriterState>>,
}

impl JsonlAuditWriter {
    /// Construct a writer that stores logs in `log_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the directory cannot be created.
    pub fn new(log_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&log_dir).map_err(|e| {
            AppError::Io(format!(
                "failed to create audit log directory {}: {e}",
                log_dir.display()
            ))
        })?;
        Ok(Self {
            log_dir,
            state: Mutex::new(None),
        })
    }

    /// Path of the log file written for `date`.
    #[must_use]
    pub fn path_for_date(&self, date: NaiveDate) -> PathBuf {
        self.log_dir.join(format!("audit-{date}.jsonl"))
    }

    fn open(path: &Path) -> Result<BufWriter<fs::File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::Io(format!("failed to open audit log {}: {e}", path.display())))?;
        Ok(BufWriter::new(file))
    }
}

impl AuditLogger for JsonlAuditWriter {
    fn log_entry(&self, entry: AuditEntry) -> Result<()> {
        let today = Utc::now().date_naive();

        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::Io("audit writer mutex poisoned".into()))?;

        if guard.as_ref().is_none_or(|s| s.current_date != today) {
            *guard = Some(WriterState {
                current_date: today,
                writer: Self::open(&self.path_for_date(today))?,
            });
        }

        let Some(state) = guard.as_mut() else {
            return Ok(());
        };

        let line = serde_json::to_string(&entry)
            .map_err(|e| AppError::Io(format!("failed to serialize audit entry: {e}")))?;
        if let Err(e) = writeln!(state.writer, "{line}").and_then(|()| state.writer.flush()) {
            warn!(%e, "failed to write audit log entry");
            return Err(AppError::Io(format!("audit write failed: {e}")));
        }

        Ok(())
    }
}
