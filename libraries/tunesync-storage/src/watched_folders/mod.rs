//! Watched folder storage
//!
//! Persists the registrations owned by the scheduler. Cadence is stored in
//! milliseconds; timestamps are Unix epoch seconds.

use sqlx::SqlitePool;
use std::time::Duration;
use tunesync_core::types::{CreateWatchedFolder, ScanMode, WatchedFolder, WatchedFolderPatch};
use tunesync_core::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct WatchedFolderRow {
    id: i64,
    path: String,
    mode: String,
    cadence_ms: Option<i64>,
    enabled: i64,
    last_scanned_at: Option<i64>,
}

impl TryFrom<WatchedFolderRow> for WatchedFolder {
    type Error = StoreError;

    fn try_from(r: WatchedFolderRow) -> Result<Self> {
        let mode = ScanMode::from_str(&r.mode)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown scan mode '{}'", r.mode)))?;

        Ok(WatchedFolder {
            id: r.id,
            path: r.path,
            mode,
            cadence: r.cadence_ms.map(|ms| Duration::from_millis(ms as u64)),
            enabled: r.enabled != 0,
            last_scanned_at: r.last_scanned_at,
        })
    }
}

/// Get all watched folders ordered by id
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<WatchedFolder>> {
    let rows: Vec<WatchedFolderRow> = sqlx::query_as(
        r#"
        SELECT id, path, mode, cadence_ms, enabled, last_scanned_at
        FROM watched_folders
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WatchedFolder::try_from).collect()
}

/// Get a watched folder by ID
pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<WatchedFolder>> {
    let row: Option<WatchedFolderRow> = sqlx::query_as(
        r#"
        SELECT id, path, mode, cadence_ms, enabled, last_scanned_at
        FROM watched_folders
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(WatchedFolder::try_from).transpose()
}

/// Create a new watched folder
///
/// Fails with `StoreError::Conflict` when the path is already registered.
pub async fn create(pool: &SqlitePool, folder: &CreateWatchedFolder) -> Result<WatchedFolder> {
    let now = chrono::Utc::now().timestamp();
    let cadence_ms = folder.cadence.map(|c| c.as_millis() as i64);
    let enabled = i64::from(folder.enabled);

    let result = sqlx::query(
        r#"
        INSERT INTO watched_folders (path, mode, cadence_ms, enabled, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&folder.path)
    .bind(folder.mode.as_str())
    .bind(cadence_ms)
    .bind(enabled)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(WatchedFolder {
        id: result.last_insert_rowid(),
        path: folder.path.clone(),
        mode: folder.mode,
        cadence: folder.cadence,
        enabled: folder.enabled,
        last_scanned_at: None,
    })
}

/// Apply a partial update
pub async fn update(pool: &SqlitePool, id: i64, patch: &WatchedFolderPatch) -> Result<WatchedFolder> {
    let current = get_by_id(pool, id)
        .await?
        .ok_or_else(|| StoreError::not_found("watched folder", id.to_string()))?;

    let next = patch.apply_to(&current);
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        UPDATE watched_folders
        SET path = ?, mode = ?, cadence_ms = ?, enabled = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&next.path)
    .bind(next.mode.as_str())
    .bind(next.cadence.map(|c| c.as_millis() as i64))
    .bind(i64::from(next.enabled))
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(next)
}

/// Delete a watched folder
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM watched_folders WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Update the last completed scan timestamp
pub async fn set_last_scanned_at(pool: &SqlitePool, id: i64, timestamp: i64) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        UPDATE watched_folders
        SET last_scanned_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(timestamp)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("watched folder", id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_with_unknown_mode_is_rejected() {
        let row = WatchedFolderRow {
            id: 1,
            path: "/music".to_string(),
            mode: "hourly".to_string(),
            cadence_ms: None,
            enabled: 1,
            last_scanned_at: None,
        };
        assert!(matches!(
            WatchedFolder::try_from(row),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn row_cadence_is_milliseconds() {
        let row = WatchedFolderRow {
            id: 7,
            path: "/music".to_string(),
            mode: "continuous".to_string(),
            cadence_ms: Some(600_000),
            enabled: 0,
            last_scanned_at: Some(99),
        };
        let folder = WatchedFolder::try_from(row).unwrap();
        assert_eq!(folder.cadence, Some(Duration::from_secs(600)));
        assert!(!folder.enabled);
        assert_eq!(folder.mode, ScanMode::Continuous);
    }
}
