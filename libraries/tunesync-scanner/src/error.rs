//! Error types for scanning and scheduling

use std::path::PathBuf;
use thiserror::Error;
use tunesync_core::StoreError;

/// Scan errors
///
/// `Traversal`, `Fingerprint`, `Parse` and `Persist` are recovered inside a
/// run and reported in its error list. `StoreUnavailable`, `RootNotFound` and
/// `RootNotDirectory` end a run (the root variants only when no other root is usable).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Traversal error at {path}: {reason}")]
    Traversal { path: PathBuf, reason: String },

    #[error("Cannot stat {path}: {reason}")]
    Fingerprint { path: PathBuf, reason: String },

    #[error("Failed to parse tags of {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to persist {path}: {reason}")]
    Persist { path: String, reason: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Root is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Scan worker failed: {0}")]
    Worker(String),
}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Watched-folder scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scan already running for watched folder {0}")]
    ScanAlreadyRunning(i64),

    #[error("Watched folder already registered: {0}")]
    DuplicatePath(String),

    #[error("Watched folder not found: {0}")]
    FolderNotFound(i64),

    #[error("Invalid schedule: {0}")]
    InvalidCadence(String),

    #[error("Scan task failed: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}
