//! Cheap per-file identity from `stat`

use crate::ScanError;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tunesync_core::types::FileFingerprint;

/// Fingerprint a file from filesystem metadata only
///
/// The file contents are never opened. A failed `stat` (typically a file
/// removed mid-walk) is returned as [`ScanError::Fingerprint`]; callers treat
/// such paths as changed.
pub fn fingerprint(path: &Path) -> Result<FileFingerprint, ScanError> {
    let meta = std::fs::metadata(path).map_err(|e| ScanError::Fingerprint {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(FileFingerprint::new(
        path.to_string_lossy(),
        mtime_ns(&meta),
        meta.len(),
    ))
}

/// Fingerprint, falling back to [`FileFingerprint::unknown`] on failure
pub fn fingerprint_or_unknown(path: &Path) -> (FileFingerprint, Option<ScanError>) {
    match fingerprint(path) {
        Ok(fp) => (fp, None),
        Err(e) => (FileFingerprint::unknown(path.to_string_lossy()), Some(e)),
    }
}

fn mtime_ns(meta: &std::fs::Metadata) -> Option<i64> {
    let modified = meta.modified().ok()?;
    let nanos = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).ok()?,
        Err(before_epoch) => -i64::try_from(before_epoch.duration().as_nanos()).ok()?,
    };
    Some(nanos)
}
