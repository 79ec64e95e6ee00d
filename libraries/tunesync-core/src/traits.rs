/// Store contracts consumed by the scanner
use crate::error::Result;
use crate::types::{
    BulkWriteOutcome, CreateWatchedFolder, PersistedFingerprint, TrackRecord, WatchedFolder,
    WatchedFolderPatch,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Persistent track store
///
/// Owns `TrackRecord`s. The scanner only reads a fingerprint snapshot and
/// applies bulk writes; it never reaches into the schema beyond this trait.
///
/// Bulk writes recover per-record failures into `BulkWriteOutcome::failures`.
/// An `Err` from any method means the store as a whole is unusable.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Snapshot of every persisted path and its last-known fingerprint
    async fn get_all_fingerprints(&self) -> Result<HashMap<String, PersistedFingerprint>>;

    /// Insert new track records
    async fn add_tracks_bulk(&self, records: &[TrackRecord]) -> Result<BulkWriteOutcome>;

    /// Replace metadata and fingerprint of existing track records
    async fn update_tracks_bulk(&self, records: &[TrackRecord]) -> Result<BulkWriteOutcome>;

    /// Remove track records by path
    async fn delete_tracks_bulk(&self, paths: &[String]) -> Result<BulkWriteOutcome>;
}

/// Persistence for watched-folder registrations
#[async_trait]
pub trait WatchedFolderStore: Send + Sync {
    /// Load every registration
    async fn list(&self) -> Result<Vec<WatchedFolder>>;

    /// Insert a registration and return it with its assigned id
    async fn create(&self, folder: &CreateWatchedFolder) -> Result<WatchedFolder>;

    /// Apply a partial update; returns the stored result
    async fn update(&self, id: i64, patch: &WatchedFolderPatch) -> Result<WatchedFolder>;

    /// Delete a registration; returns whether a row existed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Record the completion time (Unix epoch seconds) of a finished scan
    async fn set_last_scanned_at(&self, id: i64, timestamp: i64) -> Result<()>;
}
