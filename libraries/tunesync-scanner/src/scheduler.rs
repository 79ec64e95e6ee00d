//! Watched-folder scheduling
//!
//! The scheduler owns watched-folder registrations (persisted through a
//! [`WatchedFolderStore`]) and triggers [`SyncOrchestrator`] runs:
//!
//! - `startup` folders run once when [`WatchedFolderScheduler::start`] is called
//! - `continuous` folders run every `cadence` while enabled
//! - [`WatchedFolderScheduler::rescan_now`] runs a folder on demand
//!
//! At most one run per folder is active at any time. A trigger that finds a
//! run in progress is rejected with [`SchedulerError::ScanAlreadyRunning`].

use crate::orchestrator::{RunOptions, ScanOutcome, SyncOrchestrator};
use crate::progress::ProgressEvent;
use crate::SchedulerError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tunesync_core::types::{validate_schedule, CreateWatchedFolder, ScanMode, WatchedFolder, WatchedFolderPatch};
use tunesync_core::{StoreError, WatchedFolderStore};

/// Handle to a run started by the scheduler
#[derive(Debug)]
pub struct ScanHandle {
    pub folder_id: i64,
    cancel: CancellationToken,
    handle: JoinHandle<Result<ScanOutcome, SchedulerError>>,
}

impl ScanHandle {
    /// Request cooperative cancellation of the run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish
    pub async fn wait(self) -> Result<ScanOutcome, SchedulerError> {
        self.handle
            .await
            .map_err(|e| SchedulerError::TaskFailed(e.to_string()))?
    }
}

/// Runtime state of one registration
struct FolderSlot {
    folder: WatchedFolder,
    /// Held for the whole duration of a run
    running: Arc<Mutex<()>>,
    active: Option<CancellationToken>,
    timer: Option<JoinHandle<()>>,
}

impl FolderSlot {
    fn new(folder: WatchedFolder) -> Self {
        Self {
            folder,
            running: Arc::new(Mutex::new(())),
            active: None,
            timer: None,
        }
    }

    fn timer_alive(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }
}

struct Inner {
    orchestrator: SyncOrchestrator,
    store: Arc<dyn WatchedFolderStore>,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    folders: RwLock<HashMap<i64, FolderSlot>>,
    shutdown: CancellationToken,
    started: AtomicBool,
}

/// Owns watched folders and triggers scans for them
pub struct WatchedFolderScheduler {
    inner: Arc<Inner>,
}

impl WatchedFolderScheduler {
    /// Load registrations from `store`
    ///
    /// Nothing runs until [`start`](Self::start) is called.
    pub async fn load(
        orchestrator: SyncOrchestrator,
        store: Arc<dyn WatchedFolderStore>,
        progress: Option<mpsc::Sender<ProgressEvent>>,
    ) -> Result<Self, SchedulerError> {
        let folders = store.list().await?;
        info!("Loaded {} watched folder(s)", folders.len());

        let slots = folders
            .into_iter()
            .map(|folder| (folder.id, FolderSlot::new(folder)))
            .collect();

        Ok(Self {
            inner: Arc::new(Inner {
                orchestrator,
                store,
                progress,
                folders: RwLock::new(slots),
                shutdown: CancellationToken::new(),
                started: AtomicBool::new(false),
            }),
        })
    }

    /// Register a new watched folder and return its id
    pub async fn register(
        &self,
        path: impl AsRef<Path>,
        mode: ScanMode,
        cadence: Option<Duration>,
        enabled: bool,
    ) -> Result<i64, SchedulerError> {
        validate_schedule(mode, cadence).map_err(SchedulerError::InvalidCadence)?;
        let path = normalize_path(path.as_ref());

        let mut folders = self.inner.folders.write().await;
        if folders.values().any(|slot| slot.folder.path == path) {
            return Err(SchedulerError::DuplicatePath(path));
        }

        let request = CreateWatchedFolder {
            path: path.clone(),
            mode,
            cadence,
            enabled,
        };
        let folder = self
            .inner
            .store
            .create(&request)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => SchedulerError::DuplicatePath(path.clone()),
                other => SchedulerError::Store(other),
            })?;

        let id = folder.id;
        info!("Registered watched folder {} ({}, {})", id, folder.path, folder.mode);
        let mut slot = FolderSlot::new(folder);
        if self.inner.started.load(Ordering::SeqCst) && mode == ScanMode::Continuous {
            slot.timer = Some(self.inner.spawn_timer(id));
        }
        folders.insert(id, slot);

        Ok(id)
    }

    /// Patch the fields present in `patch`
    ///
    /// Cadence changes apply from the next fire on; a sleep already in
    /// progress is not shortened.
    pub async fn update(
        &self,
        id: i64,
        patch: WatchedFolderPatch,
    ) -> Result<WatchedFolder, SchedulerError> {
        let mut patch = patch;
        if let Some(path) = &patch.path {
            patch.path = Some(normalize_path(Path::new(path)));
        }

        let mut folders = self.inner.folders.write().await;
        let current = folders
            .get(&id)
            .map(|slot| slot.folder.clone())
            .ok_or(SchedulerError::FolderNotFound(id))?;

        let next = patch.apply_to(&current);
        validate_schedule(next.mode, next.cadence).map_err(SchedulerError::InvalidCadence)?;
        if next.path != current.path
            && folders.values().any(|slot| slot.folder.path == next.path)
        {
            return Err(SchedulerError::DuplicatePath(next.path));
        }

        let stored = self
            .inner
            .store
            .update(id, &patch)
            .await
            .map_err(|e| map_store_error(e, id, &next.path))?;

        let started = self.inner.started.load(Ordering::SeqCst);
        if let Some(slot) = folders.get_mut(&id) {
            slot.folder = stored.clone();
            if started && stored.mode == ScanMode::Continuous && !slot.timer_alive() {
                slot.timer = Some(self.inner.spawn_timer(id));
            }
        }

        debug!("Updated watched folder {}", id);
        Ok(stored)
    }

    /// Delete a registration, cancelling its timer and any active run
    pub async fn remove(&self, id: i64) -> Result<(), SchedulerError> {
        let existed = self.inner.store.delete(id).await?;
        let slot = self.inner.folders.write().await.remove(&id);

        match slot {
            Some(slot) => {
                if let Some(cancel) = slot.active {
                    cancel.cancel();
                }
                if let Some(timer) = slot.timer {
                    timer.abort();
                }
                info!("Removed watched folder {}", id);
                Ok(())
            }
            None if existed => Ok(()),
            None => Err(SchedulerError::FolderNotFound(id)),
        }
    }

    /// All registrations ordered by id
    pub async fn list(&self) -> Vec<WatchedFolder> {
        let folders = self.inner.folders.read().await;
        let mut list: Vec<_> = folders.values().map(|slot| slot.folder.clone()).collect();
        list.sort_by_key(|folder| folder.id);
        list
    }

    pub async fn get(&self, id: i64) -> Option<WatchedFolder> {
        self.inner
            .folders
            .read()
            .await
            .get(&id)
            .map(|slot| slot.folder.clone())
    }

    /// Start scheduling
    ///
    /// Runs every enabled `startup` folder once and arms the timers of
    /// `continuous` folders. Returns the handles of the startup runs; later
    /// calls are no-ops and return an empty list.
    pub async fn start(&self) -> Vec<ScanHandle> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        let (startup, continuous): (Vec<_>, Vec<_>) = {
            let folders = self.inner.folders.read().await;
            folders
                .values()
                .map(|slot| &slot.folder)
                .filter(|folder| folder.mode == ScanMode::Continuous || folder.enabled)
                .map(|folder| (folder.id, folder.mode))
                .partition(|(_, mode)| *mode == ScanMode::Startup)
        };

        {
            let mut folders = self.inner.folders.write().await;
            for (id, _) in &continuous {
                if let Some(slot) = folders.get_mut(id) {
                    if !slot.timer_alive() {
                        slot.timer = Some(self.inner.spawn_timer(*id));
                    }
                }
            }
        }

        let mut handles = Vec::with_capacity(startup.len());
        for (id, _) in startup {
            match self.inner.launch(id).await {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Startup scan of watched folder {} not started: {}", id, e),
            }
        }

        info!(
            "Scheduler started: {} startup scan(s), {} continuous folder(s)",
            handles.len(),
            continuous.len()
        );
        handles
    }

    /// Scan a folder now
    ///
    /// Fails with [`SchedulerError::ScanAlreadyRunning`] if the folder is
    /// already being scanned; the request is not queued.
    pub async fn rescan_now(&self, id: i64) -> Result<ScanHandle, SchedulerError> {
        self.inner.launch(id).await
    }

    /// Cancel the active run of a folder; returns whether one was running
    pub async fn cancel(&self, id: i64) -> bool {
        let folders = self.inner.folders.read().await;
        match folders.get(&id).and_then(|slot| slot.active.as_ref()) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, id: i64) -> bool {
        let folders = self.inner.folders.read().await;
        folders
            .get(&id)
            .is_some_and(|slot| slot.running.try_lock().is_err())
    }

    /// Stop all timers and cancel active runs
    pub fn shutdown(&self) {
        debug!("Scheduler shutting down");
        self.inner.shutdown.cancel();
    }
}

impl Drop for WatchedFolderScheduler {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    /// Start a run for `id` unless one is already active
    async fn launch(self: &Arc<Self>, id: i64) -> Result<ScanHandle, SchedulerError> {
        let (root, guard, cancel) = {
            let mut folders = self.folders.write().await;
            let slot = folders
                .get_mut(&id)
                .ok_or(SchedulerError::FolderNotFound(id))?;
            let guard = Arc::clone(&slot.running)
                .try_lock_owned()
                .map_err(|_| SchedulerError::ScanAlreadyRunning(id))?;
            let cancel = self.shutdown.child_token();
            slot.active = Some(cancel.clone());
            (PathBuf::from(&slot.folder.path), guard, cancel)
        };

        debug!("Starting scan of watched folder {} at {}", id, root.display());
        let inner = Arc::clone(self);
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let mut options = RunOptions::default().with_cancel(run_cancel);
            options.progress = inner.progress.clone();

            let result = inner.orchestrator.run(&[root], options).await;
            inner.finish_run(id, &result).await;
            result.map_err(SchedulerError::from)
        });

        Ok(ScanHandle {
            folder_id: id,
            cancel,
            handle,
        })
    }

    /// Record completion; only finished, uncancelled runs touch `last_scanned_at`
    async fn finish_run(&self, id: i64, result: &Result<ScanOutcome, crate::ScanError>) {
        let completed = matches!(result, Ok(outcome) if !outcome.stats.cancelled);
        let now = chrono::Utc::now().timestamp();

        if completed {
            if let Err(e) = self.store.set_last_scanned_at(id, now).await {
                warn!("Failed to record scan time of watched folder {}: {}", id, e);
            }
        }

        let mut folders = self.folders.write().await;
        if let Some(slot) = folders.get_mut(&id) {
            slot.active = None;
            if completed {
                slot.folder.last_scanned_at = Some(now);
            }
        }

        if let Err(e) = result {
            warn!("Scan of watched folder {} failed: {}", id, e);
        }
    }

    fn spawn_timer(self: &Arc<Self>, id: i64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.timer_loop(id).await })
    }

    async fn timer_loop(self: Arc<Self>, id: i64) {
        loop {
            let Some(cadence) = self.cadence_of(id).await else {
                debug!("Timer for watched folder {} stopped", id);
                return;
            };

            tokio::select! {
                () = self.shutdown.cancelled() => return,
                () = tokio::time::sleep(cadence) => {}
            }

            match self.folders.read().await.get(&id) {
                Some(slot) if slot.folder.mode == ScanMode::Continuous => {
                    if !slot.folder.enabled {
                        continue;
                    }
                }
                _ => return,
            }

            match self.launch(id).await {
                Ok(handle) => {
                    if let Err(e) = handle.wait().await {
                        debug!("Scheduled scan of watched folder {} ended with error: {}", id, e);
                    }
                }
                Err(SchedulerError::ScanAlreadyRunning(_)) => {
                    debug!("Skipping scheduled scan of watched folder {}: already running", id);
                }
                Err(e) => {
                    warn!("Scheduled scan of watched folder {} not started: {}", id, e);
                    return;
                }
            }
        }
    }

    /// Current cadence, or `None` once the folder is gone or no longer continuous
    async fn cadence_of(&self, id: i64) -> Option<Duration> {
        let folders = self.folders.read().await;
        let folder = &folders.get(&id)?.folder;
        match folder.mode {
            ScanMode::Continuous => folder.cadence,
            ScanMode::Startup => None,
        }
    }
}

fn map_store_error(err: StoreError, id: i64, path: &str) -> SchedulerError {
    match err {
        StoreError::NotFound { .. } => SchedulerError::FolderNotFound(id),
        StoreError::Conflict(_) => SchedulerError::DuplicatePath(path.to_string()),
        other => SchedulerError::Store(other),
    }
}

/// Canonical form of an existing path, otherwise the path as given
fn normalize_path(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
