//! Track records and bulk write results

use crate::types::FileFingerprint;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tag metadata parsed from an audio file
///
/// Numeric fields use zero for "unknown" so that degraded records stay
/// shape-compatible with parsed ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub track_number: u32,
    pub track_total: u32,
    pub disc_number: u32,
    pub disc_total: u32,
    /// Recording date as written in the tag (often just a year)
    pub date: Option<String>,
    pub duration_secs: f64,
    pub file_size: u64,
    /// Bitrate in kbps
    pub bitrate: Option<u32>,
    /// Sample rate in Hz
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

impl TagMetadata {
    /// Fallback record used when tag parsing fails
    ///
    /// The title comes from the file stem; every numeric field is zero.
    pub fn degraded(path: &Path) -> Self {
        Self {
            title: title_from_path(path),
            ..Default::default()
        }
    }
}

/// Title derived from a file name (`/music/01 Intro.mp3` -> `01 Intro`)
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Track row keyed by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub path: String,
    pub fingerprint: FileFingerprint,
    pub metadata: TagMetadata,
}

/// One record a bulk write could not apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub path: String,
    pub reason: String,
}

/// Result of a bulk write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteOutcome {
    /// Number of rows written
    pub written: usize,
    /// Records that failed individually
    pub failures: Vec<RecordFailure>,
}

impl BulkWriteOutcome {
    pub fn record_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(RecordFailure {
            path: path.into(),
            reason: reason.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_uses_file_stem_and_zeroes() {
        let meta = TagMetadata::degraded(Path::new("/music/Artist/03 Broken Song.flac"));
        assert_eq!(meta.title, "03 Broken Song");
        assert_eq!(meta.track_number, 0);
        assert_eq!(meta.duration_secs, 0.0);
        assert_eq!(meta.file_size, 0);
        assert!(meta.artist.is_none());
    }

    #[test]
    fn title_from_path_without_extension() {
        assert_eq!(title_from_path(Path::new("/music/noext")), "noext");
    }
}
