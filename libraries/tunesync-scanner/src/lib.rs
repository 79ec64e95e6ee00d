//! Tunesync Scanner
//!
//! Incremental synchronisation of a music library on disk with the track
//! store.
//!
//! # Features
//!
//! - Lazy directory walking with an audio extension allow-list
//! - `stat`-only fingerprints (mtime + size) for change detection
//! - Pure delta classification against one snapshot of the store
//! - Parallel tag extraction for added and modified files only
//! - Throttled progress events that never block extraction
//! - Watched folders scanned at startup, on a cadence, or on demand
//!
//! # Architecture
//!
//! - `walker`: Directory traversal (`PathWalker`)
//! - `fingerprint`: Per-file identity from filesystem metadata
//! - `reconcile`: Pure diff into a `ScanDelta`
//! - `metadata`: Tag container sniffing and reading
//! - `extractor`: Worker pool around a `TagReader`
//! - `progress`: Scan phases and the progress channel
//! - `orchestrator`: Walk -> Diff -> Parse -> Persist (`SyncOrchestrator`)
//! - `scheduler`: Watched-folder scheduling (`WatchedFolderScheduler`)

mod config;
mod error;

pub mod extractor;
pub mod fingerprint;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod reconcile;
pub mod scheduler;
pub mod walker;

pub use config::ScanConfig;
pub use error::{ScanError, SchedulerError};
pub use extractor::{ExtractedRecord, ExtractionReport, MetadataExtractor, RecordStatus};
pub use metadata::{LoftyTagReader, TagContainer, TagReader};
pub use orchestrator::{RunOptions, ScanOutcome, ScanStats, SyncContext, SyncOrchestrator};
pub use progress::{progress_channel, ProgressEvent, ProgressReporter, ProgressTick, ScanPhase};
pub use reconcile::{diff, ScanDelta};
pub use scheduler::{ScanHandle, WatchedFolderScheduler};
pub use walker::{PathWalker, WalkAccelerator, WalkOptions};
