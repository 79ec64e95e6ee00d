//! Filesystem-derived file identity
//!
//! A fingerprint is the cheap identity used to decide whether a file must be
//! re-tagged: modification time in nanoseconds plus size in bytes.

use serde::{Deserialize, Serialize};

/// Identity of a file on disk, derived from `stat` only
///
/// `PartialEq` is structural and exists for tests and collections. Change
/// detection must go through [`FileFingerprint::matches`], which never treats
/// a missing mtime as equal to anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// Absolute path of the file
    pub path: String,

    /// Modification time in nanoseconds since the Unix epoch
    ///
    /// `None` when the platform or a failed `stat` could not provide it.
    pub mtime_ns: Option<i64>,

    /// File size in bytes
    pub size_bytes: u64,
}

impl FileFingerprint {
    /// Create a fingerprint
    pub fn new(path: impl Into<String>, mtime_ns: Option<i64>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            mtime_ns,
            size_bytes,
        }
    }

    /// Fingerprint for a path whose `stat` failed
    ///
    /// It never matches anything, so the path is always reparsed.
    pub fn unknown(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mtime_ns: None,
            size_bytes: 0,
        }
    }

    /// Whether the file is known to be unchanged relative to `other`
    #[must_use]
    pub fn matches(&self, other: &FileFingerprint) -> bool {
        match (self.mtime_ns, other.mtime_ns) {
            (Some(a), Some(b)) => a == b && self.size_bytes == other.size_bytes,
            _ => false,
        }
    }

    /// Persisted representation without the path
    #[must_use]
    pub fn persisted(&self) -> PersistedFingerprint {
        PersistedFingerprint {
            mtime_ns: self.mtime_ns,
            size_bytes: self.size_bytes,
        }
    }
}

/// Fingerprint as stored next to a track row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistedFingerprint {
    pub mtime_ns: Option<i64>,
    pub size_bytes: u64,
}

impl PersistedFingerprint {
    /// Attach the path this fingerprint was stored under
    #[must_use]
    pub fn with_path(self, path: impl Into<String>) -> FileFingerprint {
        FileFingerprint::new(path, self.mtime_ns, self.size_bytes)
    }
}
