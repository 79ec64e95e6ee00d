//! Tunesync Core
//!
//! Shared domain types and store contracts for incremental music library
//! synchronization.
//!
//! # Architecture
//!
//! - **Domain Types**: `FileFingerprint`, `TagMetadata`, `TrackRecord`, `WatchedFolder`
//! - **Store Traits**: `TrackStore` (fingerprints + bulk track writes) and
//!   `WatchedFolderStore` (watched-folder registrations)
//! - **Error Handling**: `StoreError` separating "store unreachable" from per-record failures
//!
//! # Example
//!
//! ```rust
//! use tunesync_core::types::FileFingerprint;
//!
//! let before = FileFingerprint::new("/music/a.mp3", Some(1_700_000_000_000_000_000), 100);
//! let after = FileFingerprint::new("/music/a.mp3", Some(1_700_000_000_000_000_001), 100);
//!
//! // mtime alone is enough to force a reparse
//! assert!(!before.matches(&after));
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, StoreError};
pub use traits::{TrackStore, WatchedFolderStore};
pub use types::{
    BulkWriteOutcome, CreateWatchedFolder, FileFingerprint, PersistedFingerprint, RecordFailure,
    ScanMode, TagMetadata, TrackRecord, WatchedFolder, WatchedFolderPatch,
};
