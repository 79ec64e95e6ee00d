//! Watched-folder scheduler tests
//!
//! Registrations persist to a real SQLite file; track writes go to the
//! in-memory store so runs can be counted and slowed down.


use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_helpers::*;
use tunesync_core::{ScanMode, WatchedFolderPatch, WatchedFolderStore};
use tunesync_scanner::{SchedulerError, WatchedFolderScheduler};
use tunesync_storage::SqliteStore;

struct Fixture {
    scheduler: WatchedFolderScheduler,
    tracks: Arc<MemoryStore>,
    folders: Arc<SqliteStore>,
    library: TempDir,
    _db: TempDir,
}

async fn fixture() -> Fixture {
    init_tracing();
    let db = TempDir::new().unwrap();
    let url = format!("sqlite://{}", db.path().join("folders.db").display());
    let pool = tunesync_storage::create_pool(&url).await.unwrap();
    tunesync_storage::run_migrations(&pool).await.unwrap();
    let folders = Arc::new(SqliteStore::new(pool));

    let library = TempDir::new().unwrap();
    write_file(library.path(), "a.mp3", 100, T1);
    write_file(library.path(), "b.mp3", 200, T1);
    write_file(library.path(), "c.mp3", 300, T1);

    let tracks = MemoryStore::new();
    let orchestrator = orchestrator(tracks.clone(), Arc::new(CountingReader::default()));
    let scheduler = WatchedFolderScheduler::load(orchestrator, folders.clone(), None)
        .await
        .unwrap();

    Fixture {
        scheduler,
        tracks,
        folders,
        library,
        _db: db,
    }
}

fn runs(fixture: &Fixture) -> usize {
    fixture.tracks.snapshot_calls.load(Ordering::SeqCst)
}

#[tokio::test]
async fn test_register_validates_schedule() {
    let f = fixture().await;

    let result = f
        .scheduler
        .register(f.library.path(), ScanMode::Continuous, None, true)
        .await;
    assert!(matches!(result, Err(SchedulerError::InvalidCadence(_))));

    let result = f
        .scheduler
        .register(f.library.path(), ScanMode::Startup, Some(Duration::from_secs(60)), true)
        .await;
    assert!(matches!(result, Err(SchedulerError::InvalidCadence(_))));

    assert!(f.scheduler.list().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_root_is_rejected() {
    let f = fixture().await;
    f.scheduler
        .register(f.library.path(), ScanMode::Startup, None, true)
        .await
        .unwrap();

    let same_with_slash = format!("{}/", f.library.path().display());
    let result = f
        .scheduler
        .register(&same_with_slash, ScanMode::Continuous, Some(Duration::from_secs(60)), true)
        .await;

    assert!(matches!(result, Err(SchedulerError::DuplicatePath(_))));
    assert_eq!(f.scheduler.list().await.len(), 1);
}

#[tokio::test]
async fn test_update_patches_only_given_fields() {
    let f = fixture().await;
    let id = f
        .scheduler
        .register(f.library.path(), ScanMode::Continuous, Some(Duration::from_secs(600)), true)
        .await
        .unwrap();

    let updated = f
        .scheduler
        .update(
            id,
            WatchedFolderPatch {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.enabled);
    assert_eq!(updated.cadence, Some(Duration::from_secs(600)));
    assert_eq!(updated.mode, ScanMode::Continuous);

    let stored = f.folders.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].enabled);
    assert_eq!(stored[0].cadence, Some(Duration::from_secs(600)));

    let result = f
        .scheduler
        .update(
            id,
            WatchedFolderPatch {
                cadence: Some(None),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(SchedulerError::InvalidCadence(_))));

    let result = f.scheduler.update(999, WatchedFolderPatch::default()).await;
    assert!(matches!(result, Err(SchedulerError::FolderNotFound(999))));
}

#[tokio::test]
async fn test_remove_deletes_registration() {
    let f = fixture().await;
    let id = f
        .scheduler
        .register(f.library.path(), ScanMode::Startup, None, true)
        .await
        .unwrap();

    f.scheduler.remove(id).await.unwrap();
    assert!(f.scheduler.get(id).await.is_none());
    assert!(f.folders.list().await.unwrap().is_empty());

    let result = f.scheduler.remove(id).await;
    assert!(matches!(result, Err(SchedulerError::FolderNotFound(_))));
}

#[tokio::test]
async fn test_concurrent_rescan_now_is_rejected() {
    let f = fixture().await;
    *f.tracks.snapshot_delay.lock().unwrap() = Some(Duration::from_millis(300));
    let id = f
        .scheduler
        .register(f.library.path(), ScanMode::Continuous, Some(Duration::from_secs(600)), true)
        .await
        .unwrap();

    let first = f.scheduler.rescan_now(id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = f.scheduler.rescan_now(id).await;

    assert!(matches!(second, Err(SchedulerError::ScanAlreadyRunning(x)) if x == id));
    assert!(f.scheduler.is_running(id).await);

    let outcome = first.wait().await.unwrap();
    assert_eq!(outcome.stats.added, 3);
    assert_eq!(runs(&f), 1);
    assert!(!f.scheduler.is_running(id).await);
    assert!(f.scheduler.get(id).await.unwrap().last_scanned_at.is_some());
    assert!(f.folders.list().await.unwrap()[0].last_scanned_at.is_some());
}

#[tokio::test]
async fn test_startup_folders_run_once() {
    let f = fixture().await;
    let disabled = TempDir::new().unwrap();
    f.scheduler
        .register(f.library.path(), ScanMode::Startup, None, true)
        .await
        .unwrap();
    f.scheduler
        .register(disabled.path(), ScanMode::Startup, None, false)
        .await
        .unwrap();

    let handles = f.scheduler.start().await;
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.wait().await.unwrap();
    }

    assert!(f.scheduler.start().await.is_empty());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runs(&f), 1);
}

#[tokio::test]
async fn test_continuous_folder_fires_until_disabled() {
    let f = fixture().await;
    let id = f
        .scheduler
        .register(f.library.path(), ScanMode::Continuous, Some(Duration::from_millis(50)), true)
        .await
        .unwrap();

    assert!(f.scheduler.start().await.is_empty());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(runs(&f) >= 2, "expected repeated runs, got {}", runs(&f));
    assert_eq!(f.tracks.paths().len(), 3);

    f.scheduler
        .update(
            id,
            WatchedFolderPatch {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let suspended_at = runs(&f);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(runs(&f), suspended_at);

    // Still registered, just suspended
    assert!(f.scheduler.get(id).await.is_some());
}

#[tokio::test]
async fn test_cancelled_run_does_not_touch_last_scanned() {
    let f = fixture().await;
    *f.tracks.snapshot_delay.lock().unwrap() = Some(Duration::from_millis(200));
    let id = f
        .scheduler
        .register(f.library.path(), ScanMode::Startup, None, true)
        .await
        .unwrap();

    let handle = f.scheduler.rescan_now(id).await.unwrap();
    assert!(f.scheduler.cancel(id).await);
    let outcome = handle.wait().await.unwrap();

    assert!(outcome.stats.cancelled);
    assert!(f.scheduler.get(id).await.unwrap().last_scanned_at.is_none());
    assert!(!f.scheduler.cancel(id).await);
}

#[tokio::test]
async fn test_registrations_survive_reload() {
    let f = fixture().await;
    let id = f
        .scheduler
        .register(f.library.path(), ScanMode::Continuous, Some(Duration::from_secs(3600)), true)
        .await
        .unwrap();

    let orchestrator = orchestrator(MemoryStore::new(), Arc::new(CountingReader::default()));
    let reloaded = WatchedFolderScheduler::load(orchestrator, f.folders.clone(), None)
        .await
        .unwrap();

    let folder = reloaded.get(id).await.unwrap();
    assert_eq!(folder.mode, ScanMode::Continuous);
    assert_eq!(folder.cadence, Some(Duration::from_secs(3600)));
    assert_eq!(folder.path, key(f.library.path()));
}
