//! Integration tests for watched folder storage


use std::time::Duration;
use test_helpers::TestDb;
use tunesync_core::types::{CreateWatchedFolder, ScanMode, WatchedFolderPatch};
use tunesync_core::{StoreError, WatchedFolderStore};
use tunesync_storage::{watched_folders, SqliteStore};

fn continuous(path: &str) -> CreateWatchedFolder {
    CreateWatchedFolder {
        path: path.to_string(),
        mode: ScanMode::Continuous,
        cadence: Some(Duration::from_secs(600)),
        enabled: true,
    }
}

#[tokio::test]
async fn test_create_and_list() {
    let db = TestDb::new().await;
    let store = SqliteStore::new(db.pool.clone());

    let created = store.create(&continuous("/music/flac")).await.unwrap();
    assert!(created.id > 0);
    assert_eq!(created.last_scanned_at, None);

    let all = store.list().await.unwrap();
    assert_eq!(all, vec![created]);
}

#[tokio::test]
async fn test_duplicate_path_conflicts() {
    let db = TestDb::new().await;
    let store = SqliteStore::new(db.pool.clone());

    store.create(&continuous("/music")).await.unwrap();
    let err = store.create(&continuous("/music")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let db = TestDb::new().await;
    let store = SqliteStore::new(db.pool.clone());

    let created = store.create(&continuous("/music")).await.unwrap();
    let updated = store
        .update(
            created.id,
            &WatchedFolderPatch {
                cadence: Some(Some(Duration::from_secs(60))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.cadence, Some(Duration::from_secs(60)));
    assert_eq!(updated.mode, ScanMode::Continuous);
    assert!(updated.enabled);

    let reloaded = watched_folders::get_by_id(&db.pool, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded, updated);
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let db = TestDb::new().await;
    let store = SqliteStore::new(db.pool.clone());

    let err = store
        .update(404, &WatchedFolderPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_last_scanned_and_delete() {
    let db = TestDb::new().await;
    let store = SqliteStore::new(db.pool.clone());

    let created = store.create(&continuous("/music")).await.unwrap();
    store.set_last_scanned_at(created.id, 1_700_000_000).await.unwrap();

    let reloaded = watched_folders::get_by_id(&db.pool, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.last_scanned_at, Some(1_700_000_000));

    assert!(store.delete(created.id).await.unwrap());
    assert!(!store.delete(created.id).await.unwrap());
    assert!(store.list().await.unwrap().is_empty());
}
