//! Bounded retry for sink writes and the dead-letter file.

use crate::config::StorageConfig;
use crate::detection::DetectionRecord;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::ErrorCode;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from storage settings.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts && is_transient(&e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{what} failed (attempt {attempt}/{}), retrying in {delay:?}: {e}",
                        self.attempts
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Whether an error may go away on its own.
fn is_transient(error: &Error) -> bool {
    match error {
        Error::Io(_) => true,
        Error::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
            e.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure
        ),
        _ => false,
    }
}

#[derive(Serialize)]
struct DeadLetterEntry<'a> {
    failed_at: DateTime<Utc>,
    error: String,
    record: &'a DetectionRecord,
}

/// Append-only JSON-lines file of records that could not be stored.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    path: PathBuf,
}

impl DeadLetter {
    /// Dead-letter file at `path`; created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a failed record with the error that stopped it.
    pub fn write(&self, record: &DetectionRecord, cause: &Error) -> Result<()> {
        let entry = DeadLetterEntry {
            failed_at: Utc::now(),
            error: cause.to_string(),
            record,
        };
        let mut line =
            serde_json::to_string(&entry).map_err(|source| Error::JsonSerialize { source })?;
        line.push('\n');

        let io_error = |source: std::io::Error| Error::DeadLetterWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(line.as_bytes()).map_err(io_error)?;

        error!(
            "Dead-lettered {} record {} to {}: {cause}",
            record.kind(),
            record_id(record),
            self.path.display()
        );
        Ok(())
    }
}

fn record_id(record: &DetectionRecord) -> &str {
    match record {
        DetectionRecord::Visual(v) => &v.id,
        DetectionRecord::Audio(a) => &a.id,
        DetectionRecord::Correlated(s) => &s.id,
    }
}
