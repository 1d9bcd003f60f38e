use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;

use crate::models::{Record, RowRef};

#[derive(Error, Debug)]
pub enum TrackerError {
    /// The store's columns are not the required set. Nothing can be read until
    /// the caller migrates it.
    #[error("store columns do not match: expected {required:?}, found {found:?}")]
    SchemaMismatch {
        required: Vec<String>,
        found: Vec<String>,
    },

    #[error(
        "store was modified externally since it was last read (read at {}, modified at {})",
        .last_synced.format("%Y-%m-%d %H:%M:%S"),
        .current.format("%Y-%m-%d %H:%M:%S")
    )]
    WriteConflict {
        last_synced: DateTime<Local>,
        current: DateTime<Local>,
    },

    #[error("invalid record: {0}")]
    Validation(String),

    #[error("{} - {} is already recorded at row {row}", .existing.company, .existing.job_title)]
    DuplicateEntry { row: RowRef, existing: Box<Record> },

    #[error("{0} not found")]
    NotFound(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("corrupt store: row {row}, column '{column}': {reason}")]
    Corrupt {
        row: RowRef,
        column: &'static str,
        reason: String,
    },

    #[error("invalid config {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
}

impl TrackerError {
    pub fn write_conflict(last_synced: SystemTime, current: SystemTime) -> Self {
        TrackerError::WriteConflict {
            last_synced: DateTime::<Local>::from(last_synced),
            current: DateTime::<Local>::from(current),
        }
    }

    /// Whether the underlying read or write of the store failed.
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            TrackerError::Io(_) | TrackerError::Store(_) | TrackerError::Corrupt { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
