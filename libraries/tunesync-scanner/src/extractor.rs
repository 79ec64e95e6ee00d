//! Parallel tag extraction for the added and modified set
//!
//! Paths are handed out through a shared atomic cursor to a fixed number of
//! blocking workers. Each worker sends `(index, result)` back over a channel and
//! the collector fills one slot per input path, so the output always has one
//! record per claimed path no matter how individual reads fail.

use crate::metadata::{LoftyTagReader, TagReader};
use crate::progress::ProgressReporter;
use crate::{ScanConfig, ScanError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tunesync_core::types::TagMetadata;

/// How a record's metadata was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Parsed,
    /// Tag reading failed; metadata is the filename fallback
    Degraded { reason: String },
}

/// Metadata for one input path
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub path: PathBuf,
    pub metadata: TagMetadata,
    pub status: RecordStatus,
}

impl ExtractedRecord {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, RecordStatus::Degraded { .. })
    }
}

/// Result of one extraction batch
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// One record per processed path, in input order
    pub records: Vec<ExtractedRecord>,
    /// Parse failures behind the degraded records
    pub failures: Vec<ScanError>,
    /// Paths never started because the batch was cancelled
    pub skipped: Vec<PathBuf>,
}

impl ExtractionReport {
    pub fn degraded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_degraded()).count()
    }

    pub fn was_cancelled(&self) -> bool {
        !self.skipped.is_empty()
    }
}

type SlotResult = (usize, Result<TagMetadata, ScanError>);

/// Tag extraction worker pool
#[derive(Clone)]
pub struct MetadataExtractor {
    reader: Arc<dyn TagReader>,
    workers: usize,
    parallel_threshold: usize,
}

impl std::fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataExtractor")
            .field("workers", &self.workers)
            .field("parallel_threshold", &self.parallel_threshold)
            .finish_non_exhaustive()
    }
}

impl MetadataExtractor {
    pub fn new(reader: Arc<dyn TagReader>, config: &ScanConfig) -> Self {
        Self {
            reader,
            workers: config.effective_workers(),
            parallel_threshold: config.parallel_threshold,
        }
    }

    /// Extractor reading real files through lofty
    pub fn lofty(config: &ScanConfig) -> Self {
        Self::new(Arc::new(LoftyTagReader::new()), config)
    }

    /// Number of workers used for a batch of `len` paths
    pub fn workers_for(&self, len: usize) -> usize {
        if len < self.parallel_threshold {
            1
        } else {
            self.workers.min(len).max(1)
        }
    }

    /// Extract a whole batch, returning exactly one record per path
    pub async fn extract_batch(&self, paths: &[PathBuf]) -> Vec<ExtractedRecord> {
        let mut reporter = ProgressReporter::disabled();
        self.extract(paths.to_vec(), &CancellationToken::new(), &mut reporter)
            .await
            .records
    }

    /// Extract with cooperative cancellation and progress ticks
    ///
    /// Cancellation is checked between files. Paths already handed to a
    /// worker finish and are returned; the rest end up in `skipped`.
    pub async fn extract(
        &self,
        paths: Vec<PathBuf>,
        cancel: &CancellationToken,
        reporter: &mut ProgressReporter,
    ) -> ExtractionReport {
        let total = paths.len();
        if total == 0 {
            return ExtractionReport::default();
        }

        let worker_count = self.workers_for(total);
        tracing::debug!(
            "Extracting tags for {} files with {} worker(s)",
            total,
            worker_count
        );

        let paths = Arc::new(paths);
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<SlotResult>();

        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                let paths = Arc::clone(&paths);
                let cursor = Arc::clone(&cursor);
                let reader = Arc::clone(&self.reader);
                let cancel = cancel.clone();
                let tx = tx.clone();
                tokio::task::spawn_blocking(move || {
                    extraction_worker(&paths, &cursor, reader.as_ref(), &cancel, &tx);
                })
            })
            .collect();
        drop(tx);

        let mut slots: Vec<Option<Result<TagMetadata, ScanError>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        let mut processed = 0;
        while let Some((index, result)) = rx.recv().await {
            processed += 1;
            reporter.tick(
                processed,
                total,
                paths[index].to_str(),
            );
            slots[index] = Some(result);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Extraction worker terminated abnormally: {}", e);
            }
        }

        let claimed = cursor.load(Ordering::SeqCst).min(total);
        assemble(&paths, slots, claimed)
    }
}

fn extraction_worker(
    paths: &[PathBuf],
    cursor: &AtomicUsize,
    reader: &dyn TagReader,
    cancel: &CancellationToken,
    tx: &mpsc::UnboundedSender<SlotResult>,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(path) = paths.get(index) else {
            break;
        };

        let result = catch_unwind(AssertUnwindSafe(|| reader.read_tags(path)))
            .unwrap_or_else(|payload| {
                Err(ScanError::Parse {
                    path: path.clone(),
                    reason: format!("tag reader panicked: {}", panic_message(payload.as_ref())),
                })
            });

        if tx.send((index, result)).is_err() {
            break;
        }
    }
}

/// Turn filled slots into records
///
/// A claimed slot without a result means its worker died; it still becomes a
/// degraded record so no claimed path goes missing.
fn assemble(
    paths: &[PathBuf],
    slots: Vec<Option<Result<TagMetadata, ScanError>>>,
    claimed: usize,
) -> ExtractionReport {
    let mut report = ExtractionReport {
        records: Vec::with_capacity(claimed),
        ..Default::default()
    };

    for (index, (path, slot)) in paths.iter().zip(slots).enumerate() {
        match slot {
            Some(Ok(metadata)) => report.records.push(ExtractedRecord {
                path: path.clone(),
                metadata,
                status: RecordStatus::Parsed,
            }),
            Some(Err(err)) => {
                tracing::warn!("{}", err);
                report.records.push(degraded(path, err.to_string()));
                report.failures.push(err);
            }
            None if index < claimed => {
                let err = ScanError::Parse {
                    path: path.clone(),
                    reason: "extraction worker lost".to_string(),
                };
                tracing::warn!("{}", err);
                report.records.push(degraded(path, err.to_string()));
                report.failures.push(err);
            }
            None => report.skipped.push(path.clone()),
        }
    }

    report
}

fn degraded(path: &std::path::Path, reason: String) -> ExtractedRecord {
    ExtractedRecord {
        path: path.to_path_buf(),
        metadata: TagMetadata::degraded(path),
        status: RecordStatus::Degraded { reason },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct StubReader {
        calls: AtomicUsize,
    }

    impl TagReader for StubReader {
        fn read_tags(&self, path: &Path) -> Result<TagMetadata, ScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with("bad") {
                return Err(ScanError::Parse {
                    path: path.to_path_buf(),
                    reason: "corrupt frame".to_string(),
                });
            }
            if name.starts_with("boom") {
                panic!("native parser crashed");
            }
            Ok(TagMetadata {
                title: format!("tagged {}", name),
                duration_secs: 180.0,
                ..Default::default()
            })
        }
    }

    fn stub_extractor(workers: usize, threshold: usize) -> (MetadataExtractor, Arc<StubReader>) {
        let reader = Arc::new(StubReader {
            calls: AtomicUsize::new(0),
        });
        let config = ScanConfig {
            workers,
            parallel_threshold: threshold,
            ..Default::default()
        };
        (MetadataExtractor::new(reader.clone(), &config), reader)
    }

    fn paths(names: &[String]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/music/{n}"))).collect()
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (extractor, reader) = stub_extractor(4, 20);
        assert!(extractor.extract_batch(&[]).await.is_empty());
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_corrupt_file_in_parallel_batch() {
        let (extractor, _) = stub_extractor(4, 20);
        let mut names: Vec<String> = (0..24).map(|i| format!("track{i:02}.mp3")).collect();
        names.insert(11, "bad_file.mp3".to_string());
        let input = paths(&names);

        let records = extractor.extract_batch(&input).await;

        assert_eq!(records.len(), 25);
        let degraded: Vec<_> = records.iter().filter(|r| r.is_degraded()).collect();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].metadata.title, "bad_file");
        assert_eq!(degraded[0].metadata.duration_secs, 0.0);

        let output_paths: Vec<_> = records.iter().map(|r| r.path.clone()).collect();
        assert_eq!(output_paths, input);
    }

    #[tokio::test]
    async fn test_panicking_reader_degrades_one_record() {
        let (extractor, _) = stub_extractor(2, 1);
        let input = paths(&[
            "one.mp3".to_string(),
            "boom.mp3".to_string(),
            "three.mp3".to_string(),
        ]);

        let mut reporter = ProgressReporter::disabled();
        let report = extractor
            .extract(input, &CancellationToken::new(), &mut reporter)
            .await;

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.degraded_count(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.records[1].metadata.title, "boom");
        assert!(!report.was_cancelled());
    }

    #[tokio::test]
    async fn test_small_batch_runs_serially() {
        let (extractor, reader) = stub_extractor(8, 20);
        assert_eq!(extractor.workers_for(5), 1);
        assert_eq!(extractor.workers_for(20), 8);
        assert_eq!(extractor.workers_for(0), 1);

        let names: Vec<String> = (0..5).map(|i| format!("{i}.flac")).collect();
        let records = extractor.extract_batch(&paths(&names)).await;
        assert_eq!(records.len(), 5);
        assert_eq!(reader.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_everything() {
        let (extractor, reader) = stub_extractor(4, 1);
        let names: Vec<String> = (0..10).map(|i| format!("{i}.mp3")).collect();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut reporter = ProgressReporter::disabled();
        let report = extractor
            .extract(paths(&names), &cancel, &mut reporter)
            .await;

        assert!(report.records.is_empty());
        assert_eq!(report.skipped.len(), 10);
        assert!(report.was_cancelled());
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }
}
