//! Track storage
//!
//! Rows are keyed by absolute path. Bulk writes run inside one transaction;
//! a constraint failure on one row is recorded and the batch continues, while
//! connection-level failures abort the batch.
//!
//! # Example
//!
//! ```rust,no_run
//! use tunesync_storage::tracks;
//!
//! # async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//! let fingerprints = tracks::get_all_fingerprints(pool).await?;
//! println!("{} tracks known", fingerprints.len());
//! # Ok(())
//! # }
//! ```

use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use tunesync_core::types::{
    BulkWriteOutcome, FileFingerprint, PersistedFingerprint, TagMetadata, TrackRecord,
};
use tunesync_core::{Result, StoreError};

/// Snapshot of every persisted fingerprint
pub async fn get_all_fingerprints(
    pool: &SqlitePool,
) -> Result<HashMap<String, PersistedFingerprint>> {
    let rows: Vec<(String, Option<i64>, i64)> =
        sqlx::query_as("SELECT path, mtime_ns, size_bytes FROM tracks")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(path, mtime_ns, size_bytes)| {
            (
                path,
                PersistedFingerprint {
                    mtime_ns,
                    size_bytes: size_bytes as u64,
                },
            )
        })
        .collect())
}

/// Get a track by path
pub async fn get_by_path(pool: &SqlitePool, path: &str) -> Result<Option<TrackRecord>> {
    let row: Option<TrackRow> = sqlx::query_as(
        r#"
        SELECT path, mtime_ns, size_bytes, title, artist, album, album_artist, genre,
               track_number, track_total, disc_number, disc_total, date, duration_secs,
               file_size, bitrate, sample_rate, channels
        FROM tracks
        WHERE path = ?
        "#,
    )
    .bind(path)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(TrackRow::into_record))
}

/// Count stored tracks
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert track records, recording per-row failures
pub async fn insert_bulk(pool: &SqlitePool, records: &[TrackRecord]) -> Result<BulkWriteOutcome> {
    let mut outcome = BulkWriteOutcome::default();
    if records.is_empty() {
        return Ok(outcome);
    }

    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    for record in records {
        match insert_one(&mut tx, record, now).await {
            Ok(()) => outcome.written += 1,
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                tracing::warn!("Failed to insert track {}: {}", record.path, e);
                outcome.record_failure(&record.path, e.to_string());
            }
        }
    }

    tx.commit().await?;
    Ok(outcome)
}

/// Update track records, recording per-row failures
///
/// Updating a path with no stored row counts as a failure.
pub async fn update_bulk(pool: &SqlitePool, records: &[TrackRecord]) -> Result<BulkWriteOutcome> {
    let mut outcome = BulkWriteOutcome::default();
    if records.is_empty() {
        return Ok(outcome);
    }

    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    for record in records {
        match update_one(&mut tx, record, now).await {
            Ok(true) => outcome.written += 1,
            Ok(false) => {
                let reason = StoreError::not_found("track", &record.path).to_string();
                outcome.record_failure(&record.path, reason);
            }
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                tracing::warn!("Failed to update track {}: {}", record.path, e);
                outcome.record_failure(&record.path, e.to_string());
            }
        }
    }

    tx.commit().await?;
    Ok(outcome)
}

/// Delete tracks by path
///
/// Paths without a stored row are ignored.
pub async fn delete_bulk(pool: &SqlitePool, paths: &[String]) -> Result<BulkWriteOutcome> {
    let mut outcome = BulkWriteOutcome::default();
    if paths.is_empty() {
        return Ok(outcome);
    }

    let mut tx = pool.begin().await?;

    for path in paths {
        let result = sqlx::query("DELETE FROM tracks WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from);

        match result {
            Ok(done) => outcome.written += done.rows_affected() as usize,
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                tracing::warn!("Failed to delete track {}: {}", path, e);
                outcome.record_failure(path, e.to_string());
            }
        }
    }

    tx.commit().await?;
    Ok(outcome)
}

async fn insert_one(tx: &mut Transaction<'_, Sqlite>, record: &TrackRecord, now: i64) -> Result<()> {
    let meta = &record.metadata;
    sqlx::query(
        r#"
        INSERT INTO tracks (
            path, mtime_ns, size_bytes, title, artist, album, album_artist, genre,
            track_number, track_total, disc_number, disc_total, date, duration_secs,
            file_size, bitrate, sample_rate, channels, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.path)
    .bind(record.fingerprint.mtime_ns)
    .bind(record.fingerprint.size_bytes as i64)
    .bind(&meta.title)
    .bind(&meta.artist)
    .bind(&meta.album)
    .bind(&meta.album_artist)
    .bind(&meta.genre)
    .bind(i64::from(meta.track_number))
    .bind(i64::from(meta.track_total))
    .bind(i64::from(meta.disc_number))
    .bind(i64::from(meta.disc_total))
    .bind(&meta.date)
    .bind(meta.duration_secs)
    .bind(meta.file_size as i64)
    .bind(meta.bitrate.map(i64::from))
    .bind(meta.sample_rate.map(i64::from))
    .bind(meta.channels.map(i64::from))
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn update_one(tx: &mut Transaction<'_, Sqlite>, record: &TrackRecord, now: i64) -> Result<bool> {
    let meta = &record.metadata;
    let result = sqlx::query(
        r#"
        UPDATE tracks
        SET mtime_ns = ?, size_bytes = ?, title = ?, artist = ?, album = ?, album_artist = ?,
            genre = ?, track_number = ?, track_total = ?, disc_number = ?, disc_total = ?,
            date = ?, duration_secs = ?, file_size = ?, bitrate = ?, sample_rate = ?,
            channels = ?, updated_at = ?
        WHERE path = ?
        "#,
    )
    .bind(record.fingerprint.mtime_ns)
    .bind(record.fingerprint.size_bytes as i64)
    .bind(&meta.title)
    .bind(&meta.artist)
    .bind(&meta.album)
    .bind(&meta.album_artist)
    .bind(&meta.genre)
    .bind(i64::from(meta.track_number))
    .bind(i64::from(meta.track_total))
    .bind(i64::from(meta.disc_number))
    .bind(i64::from(meta.disc_total))
    .bind(&meta.date)
    .bind(meta.duration_secs)
    .bind(meta.file_size as i64)
    .bind(meta.bitrate.map(i64::from))
    .bind(meta.sample_rate.map(i64::from))
    .bind(meta.channels.map(i64::from))
    .bind(now)
    .bind(&record.path)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct TrackRow {
    path: String,
    mtime_ns: Option<i64>,
    size_bytes: i64,
    title: String,
    artist: Option<String>,
    album: Option<String>,
    album_artist: Option<String>,
    genre: Option<String>,
    track_number: i64,
    track_total: i64,
    disc_number: i64,
    disc_total: i64,
    date: Option<String>,
    duration_secs: f64,
    file_size: i64,
    bitrate: Option<i64>,
    sample_rate: Option<i64>,
    channels: Option<i64>,
}

impl TrackRow {
    fn into_record(self) -> TrackRecord {
        TrackRecord {
            fingerprint: FileFingerprint::new(
                self.path.clone(),
                self.mtime_ns,
                self.size_bytes as u64,
            ),
            metadata: TagMetadata {
                title: self.title,
                artist: self.artist,
                album: self.album,
                album_artist: self.album_artist,
                genre: self.genre,
                track_number: self.track_number as u32,
                track_total: self.track_total as u32,
                disc_number: self.disc_number as u32,
                disc_total: self.disc_total as u32,
                date: self.date,
                duration_secs: self.duration_secs,
                file_size: self.file_size as u64,
                bitrate: self.bitrate.map(|b| b as u32),
                sample_rate: self.sample_rate.map(|s| s as u32),
                channels: self.channels.map(|c| c as u8),
            },
            path: self.path,
        }
    }
}
