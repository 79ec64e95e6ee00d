//! Two-phase library sync: inventory + diff, then parse the delta
//!
//! A run walks the roots, fingerprints every candidate, diffs the result
//! against one snapshot of the store, parses only added and modified files,
//! then applies the bulk writes. When nothing was added or modified the
//! extractor is never touched.

use crate::extractor::{ExtractionReport, MetadataExtractor};
use crate::fingerprint::fingerprint_or_unknown;
use crate::progress::{ProgressEvent, ProgressReporter, ScanPhase};
use crate::reconcile::{diff, ScanDelta};
use crate::walker::{PathWalker, WalkAccelerator, WalkOptions};
use crate::{ScanConfig, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tunesync_core::types::{BulkWriteOutcome, FileFingerprint, TrackRecord};
use tunesync_core::TrackStore;

/// Everything a run needs, passed in explicitly
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn TrackStore>,
    pub extractor: MetadataExtractor,
    pub config: ScanConfig,
    pub accelerator: Option<Arc<dyn WalkAccelerator>>,
}

impl SyncContext {
    /// Context using the lofty tag reader
    pub fn new(store: Arc<dyn TrackStore>, config: ScanConfig) -> Self {
        Self {
            store,
            extractor: MetadataExtractor::lofty(&config),
            config,
            accelerator: None,
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_accelerator(mut self, accelerator: Arc<dyn WalkAccelerator>) -> Self {
        self.accelerator = Some(accelerator);
        self
    }
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub progress: Option<mpsc::Sender<ProgressEvent>>,
    pub cancel: Option<CancellationToken>,
    /// Reparse unchanged files too
    pub force_refresh: bool,
}

impl RunOptions {
    #[must_use]
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

/// Statistics from one run
///
/// `added`, `modified`, `unchanged` and `deleted` are the sizes of the
/// run's [`ScanDelta`] sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub visited: usize,
    pub added: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub errors: usize,
    /// Records written with filename-only metadata
    pub degraded: usize,
    /// Paths left unparsed because the run was cancelled
    pub skipped: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Result of a run that did not fail outright
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub stats: ScanStats,
    /// Recovered per-file and per-root errors
    pub errors: Vec<ScanError>,
}

/// Output of the walking phase
#[derive(Default)]
struct Inventory {
    roots: Vec<PathBuf>,
    current: HashMap<String, FileFingerprint>,
    root_errors: Vec<ScanError>,
    errors: Vec<ScanError>,
}

/// Drives Walk -> Diff -> Parse -> Persist
#[derive(Clone)]
pub struct SyncOrchestrator {
    ctx: Arc<SyncContext>,
}

impl SyncOrchestrator {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Synchronise the store with the files under `roots`
    ///
    /// Per-file and per-root failures are returned in [`ScanOutcome::errors`].
    /// `Err` is returned only when the store is unreachable or no root
    /// could be scanned.
    pub async fn run(&self, roots: &[PathBuf], options: RunOptions) -> Result<ScanOutcome, ScanError> {
        let started = Instant::now();
        let cancel = options.cancel.clone().unwrap_or_default();
        let mut reporter = ProgressReporter::new(
            options.progress.clone(),
            self.ctx.config.progress_interval(),
        );

        reporter.enter(ScanPhase::Walking);
        let inventory = match self.inventory(roots).await {
            Ok(inventory) => inventory,
            Err(e) => {
                reporter.enter(ScanPhase::Failed);
                return Err(e);
            }
        };
        let Inventory {
            roots,
            current,
            mut root_errors,
            errors: walk_errors,
        } = inventory;

        if roots.is_empty() && !root_errors.is_empty() {
            let first = root_errors.remove(0);
            tracing::error!("No scannable root: {}", first);
            reporter.enter(ScanPhase::Failed);
            return Err(first);
        }

        let mut errors = root_errors;
        errors.extend(walk_errors);

        reporter.enter(ScanPhase::Diffing);
        let persisted = match self.persisted_under(&roots).await {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::error!("Failed to read persisted fingerprints: {}", e);
                reporter.enter(ScanPhase::Failed);
                return Err(e);
            }
        };

        let mut delta = diff(&current, &persisted);
        if options.force_refresh {
            promote_unchanged(&mut delta, &current);
        }
        tracing::debug!(
            "Delta: {} added, {} modified, {} unchanged, {} deleted",
            delta.added.len(),
            delta.modified.len(),
            delta.unchanged.len(),
            delta.deleted.len()
        );

        let report = if delta.needs_parse() {
            reporter.enter(ScanPhase::Parsing);
            let paths: Vec<PathBuf> = delta
                .added
                .iter()
                .chain(&delta.modified)
                .map(|(path, _)| PathBuf::from(path))
                .collect();
            self.ctx.extractor.extract(paths, &cancel, &mut reporter).await
        } else {
            ExtractionReport::default()
        };

        let cancelled = report.was_cancelled();
        if cancelled {
            tracing::info!(
                "Scan cancelled during parsing, {} file(s) left unparsed",
                report.skipped.len()
            );
        }

        let degraded = report.degraded_count();
        let skipped = report.skipped.len();
        errors.extend(report.failures);

        reporter.enter(ScanPhase::Persisting);
        let (adds, updates) = split_records(&delta, report.records);
        if let Err(e) = self.persist(&adds, &updates, &delta.deleted, &mut errors).await {
            tracing::error!("Store became unavailable while persisting: {}", e);
            reporter.enter(ScanPhase::Failed);
            return Err(e);
        }

        let stats = ScanStats {
            visited: current.len(),
            added: delta.added.len(),
            modified: delta.modified.len(),
            unchanged: delta.unchanged.len(),
            deleted: delta.deleted.len(),
            errors: errors.len(),
            degraded,
            skipped,
            cancelled,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        reporter.enter(ScanPhase::Idle);
        reporter.finish(&stats);

        tracing::info!(
            "Scan complete: {} visited, {} added, {} modified, {} unchanged, {} deleted, {} errors in {}ms",
            stats.visited,
            stats.added,
            stats.modified,
            stats.unchanged,
            stats.deleted,
            stats.errors,
            stats.elapsed_ms
        );

        Ok(ScanOutcome { stats, errors })
    }

    /// Walk and fingerprint every root on the blocking pool
    async fn inventory(&self, roots: &[PathBuf]) -> Result<Inventory, ScanError> {
        let roots = roots.to_vec();
        let options = WalkOptions::from(&self.ctx.config);
        let accelerator = self.ctx.accelerator.clone();

        tokio::task::spawn_blocking(move || build_inventory(&roots, options, accelerator.as_deref()))
            .await
            .map_err(|e| ScanError::Worker(e.to_string()))
    }

    /// Persisted fingerprints restricted to the walked roots
    async fn persisted_under(
        &self,
        roots: &[PathBuf],
    ) -> Result<HashMap<String, FileFingerprint>, ScanError> {
        let snapshot = self.ctx.store.get_all_fingerprints().await?;

        Ok(snapshot
            .into_iter()
            .filter(|(path, _)| roots.iter().any(|root| Path::new(path).starts_with(root)))
            .map(|(path, fp)| (path.clone(), fp.with_path(path)))
            .collect())
    }

    async fn persist(
        &self,
        adds: &[TrackRecord],
        updates: &[TrackRecord],
        deleted: &[String],
        errors: &mut Vec<ScanError>,
    ) -> Result<(), ScanError> {
        let store = &self.ctx.store;

        if !adds.is_empty() {
            let outcome = store.add_tracks_bulk(adds).await?;
            collect_failures(outcome, "insert", errors);
        }
        if !updates.is_empty() {
            let outcome = store.update_tracks_bulk(updates).await?;
            collect_failures(outcome, "update", errors);
        }
        if !deleted.is_empty() {
            let outcome = store.delete_tracks_bulk(deleted).await?;
            collect_failures(outcome, "delete", errors);
        }

        Ok(())
    }
}

fn build_inventory(
    roots: &[PathBuf],
    options: WalkOptions,
    accelerator: Option<&dyn WalkAccelerator>,
) -> Inventory {
    let walker = PathWalker::new(options);
    let mut inventory = Inventory::default();

    for root in roots {
        let root = match validate_root(root) {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!("{}", e);
                inventory.root_errors.push(e);
                continue;
            }
        };

        let paths = match accelerator.and_then(|acc| accelerate(acc, &root, &options)) {
            Some(paths) => paths,
            None => {
                let (paths, errors) = walker.collect(&root);
                inventory.errors.extend(errors);
                paths
            }
        };

        for path in paths {
            // Store keys are strings; a lossy key could never be reopened
            if path.to_str().is_none() {
                let err = ScanError::Traversal {
                    reason: "file name is not valid UTF-8".to_string(),
                    path,
                };
                tracing::warn!("{}", err);
                inventory.errors.push(err);
                continue;
            }
            let (fp, err) = fingerprint_or_unknown(&path);
            if let Some(err) = err {
                tracing::warn!("{}", err);
                inventory.errors.push(err);
            }
            inventory.current.insert(fp.path.clone(), fp);
        }
        inventory.roots.push(root);
    }

    inventory
}

fn accelerate(
    accelerator: &dyn WalkAccelerator,
    root: &Path,
    options: &WalkOptions,
) -> Option<Vec<PathBuf>> {
    match accelerator.enumerate(root, options)? {
        Ok(paths) => Some(paths),
        Err(e) => {
            tracing::warn!(
                "Walk accelerator {} failed on {}, falling back: {}",
                accelerator.name(),
                root.display(),
                e
            );
            None
        }
    }
}

/// Check that a root exists and is a directory; returns its canonical form
fn validate_root(root: &Path) -> Result<PathBuf, ScanError> {
    let meta = std::fs::metadata(root).map_err(|_| ScanError::RootNotFound(root.to_path_buf()))?;
    if !meta.is_dir() {
        return Err(ScanError::RootNotDirectory(root.to_path_buf()));
    }
    std::fs::canonicalize(root).map_err(|_| ScanError::RootNotFound(root.to_path_buf()))
}

fn promote_unchanged(delta: &mut ScanDelta, current: &HashMap<String, FileFingerprint>) {
    for path in std::mem::take(&mut delta.unchanged) {
        if let Some(fp) = current.get(&path) {
            delta.modified.push((path, fp.clone()));
        }
    }
    delta.modified.sort_by(|a, b| a.0.cmp(&b.0));
}

/// Pair extracted metadata with fingerprints, split into inserts and updates
fn split_records(
    delta: &ScanDelta,
    records: Vec<crate::extractor::ExtractedRecord>,
) -> (Vec<TrackRecord>, Vec<TrackRecord>) {
    let added: HashSet<&str> = delta.added.iter().map(|(p, _)| p.as_str()).collect();
    let fingerprints: HashMap<&str, &FileFingerprint> = delta
        .added
        .iter()
        .chain(&delta.modified)
        .map(|(p, fp)| (p.as_str(), fp))
        .collect();

    let mut adds = Vec::new();
    let mut updates = Vec::new();
    for record in records {
        let path = record.path.to_string_lossy().into_owned();
        let Some(fp) = fingerprints.get(path.as_str()) else {
            tracing::warn!("Dropping extracted record outside the delta: {}", path);
            continue;
        };
        let track = TrackRecord {
            fingerprint: (*fp).clone(),
            metadata: record.metadata,
            path,
        };
        if added.contains(track.path.as_str()) {
            adds.push(track);
        } else {
            updates.push(track);
        }
    }

    (adds, updates)
}

fn collect_failures(outcome: BulkWriteOutcome, action: &str, errors: &mut Vec<ScanError>) {
    for failure in outcome.failures {
        tracing::warn!("Failed to {} {}: {}", action, failure.path, failure.reason);
        errors.push(ScanError::Persist {
            path: failure.path,
            reason: failure.reason,
        });
    }
}
