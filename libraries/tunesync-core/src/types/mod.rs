mod fingerprint;
mod track;
mod watched_folder;

pub use fingerprint::{FileFingerprint, PersistedFingerprint};
pub use track::{title_from_path, BulkWriteOutcome, RecordFailure, TagMetadata, TrackRecord};
pub use watched_folder::{
    validate_schedule, CreateWatchedFolder, ScanMode, WatchedFolder, WatchedFolderPatch,
};
