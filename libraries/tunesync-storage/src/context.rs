use crate::{tracks, watched_folders};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tunesync_core::types::*;
use tunesync_core::{Result, TrackStore, WatchedFolderStore};

/// `SQLite`-backed store for tracks and watched folders
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TrackStore for SqliteStore {
    async fn get_all_fingerprints(&self) -> Result<HashMap<String, PersistedFingerprint>> {
        tracks::get_all_fingerprints(&self.pool).await
    }

    async fn add_tracks_bulk(&self, records: &[TrackRecord]) -> Result<BulkWriteOutcome> {
        tracks::insert_bulk(&self.pool, records).await
    }

    async fn update_tracks_bulk(&self, records: &[TrackRecord]) -> Result<BulkWriteOutcome> {
        tracks::update_bulk(&self.pool, records).await
    }

    async fn delete_tracks_bulk(&self, paths: &[String]) -> Result<BulkWriteOutcome> {
        tracks::delete_bulk(&self.pool, paths).await
    }
}

#[async_trait]
impl WatchedFolderStore for SqliteStore {
    async fn list(&self) -> Result<Vec<WatchedFolder>> {
        watched_folders::get_all(&self.pool).await
    }

    async fn create(&self, folder: &CreateWatchedFolder) -> Result<WatchedFolder> {
        watched_folders::create(&self.pool, folder).await
    }

    async fn update(&self, id: i64, patch: &WatchedFolderPatch) -> Result<WatchedFolder> {
        watched_folders::update(&self.pool, id, patch).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        watched_folders::delete(&self.pool, id).await
    }

    async fn set_last_scanned_at(&self, id: i64, timestamp: i64) -> Result<()> {
        watched_folders::set_last_scanned_at(&self.pool, id, timestamp).await
    }
}
