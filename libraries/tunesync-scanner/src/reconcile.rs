//! Delta classification between the filesystem and the store
//!
//! [`diff`] is pure: no I/O, no hidden state, a single pass over each map.
//! Output lists are sorted by path so identical inputs give identical output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tunesync_core::types::FileFingerprint;

/// Classification of every known path relative to the persisted snapshot
///
/// `added`, `modified` and `unchanged` partition the current paths;
/// `deleted` holds persisted paths missing from the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDelta {
    pub added: Vec<(String, FileFingerprint)>,
    pub modified: Vec<(String, FileFingerprint)>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ScanDelta {
    /// Whether nothing needs to be parsed
    pub fn needs_parse(&self) -> bool {
        !self.added.is_empty() || !self.modified.is_empty()
    }

    /// Whether the run has nothing to write at all
    pub fn is_noop(&self) -> bool {
        !self.needs_parse() && self.deleted.is_empty()
    }
}

/// Diff current fingerprints against persisted ones
///
/// - only in `current` -> added
/// - in both, fingerprints match -> unchanged
/// - in both, fingerprints differ or either mtime is missing -> modified
/// - only in `persisted` -> deleted
///
/// Renames show up as one delete plus one add.
pub fn diff(
    current: &HashMap<String, FileFingerprint>,
    persisted: &HashMap<String, FileFingerprint>,
) -> ScanDelta {
    let mut delta = ScanDelta::default();

    for (path, fp) in current {
        match persisted.get(path) {
            None => delta.added.push((path.clone(), fp.clone())),
            Some(known) if known.matches(fp) => delta.unchanged.push(path.clone()),
            Some(_) => delta.modified.push((path.clone(), fp.clone())),
        }
    }

    delta.deleted = persisted
        .keys()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();

    delta.added.sort_by(|a, b| a.0.cmp(&b.0));
    delta.modified.sort_by(|a, b| a.0.cmp(&b.0));
    delta.unchanged.sort();
    delta.deleted.sort();

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: i64 = 1_700_000_000_000_000_000;

    fn snapshot(entries: &[(&str, Option<i64>, u64)]) -> HashMap<String, FileFingerprint> {
        entries
            .iter()
            .map(|(path, mtime, size)| {
                (path.to_string(), FileFingerprint::new(*path, *mtime, *size))
            })
            .collect()
    }

    fn paths(entries: &[(String, FileFingerprint)]) -> Vec<&str> {
        entries.iter().map(|(p, _)| p.as_str()).collect()
    }

    #[test]
    fn test_new_file_is_added() {
        let current = snapshot(&[("/m/a.mp3", Some(T1), 100), ("/m/b.mp3", Some(T1), 200)]);
        let persisted = snapshot(&[("/m/a.mp3", Some(T1), 100)]);

        let delta = diff(&current, &persisted);
        assert_eq!(paths(&delta.added), vec!["/m/b.mp3"]);
        assert_eq!(delta.unchanged, vec!["/m/a.mp3".to_string()]);
        assert!(delta.modified.is_empty());
        assert!(delta.deleted.is_empty());
    }

    #[test]
    fn test_missing_file_is_deleted() {
        let current = snapshot(&[]);
        let persisted = snapshot(&[("/m/c.mp3", Some(T1), 300)]);

        let delta = diff(&current, &persisted);
        assert_eq!(delta.deleted, vec!["/m/c.mp3".to_string()]);
        assert!(!delta.needs_parse());
        assert!(!delta.is_noop());
    }

    #[test]
    fn test_mtime_change_alone_is_modified() {
        let current = snapshot(&[("/m/a.mp3", Some(T1 + 1), 100)]);
        let persisted = snapshot(&[("/m/a.mp3", Some(T1), 100)]);

        let delta = diff(&current, &persisted);
        assert_eq!(paths(&delta.modified), vec!["/m/a.mp3"]);
        assert_eq!(delta.modified[0].1.mtime_ns, Some(T1 + 1));
    }

    #[test]
    fn test_null_persisted_mtime_forces_modified() {
        let current = snapshot(&[("/m/a.mp3", Some(T1), 100)]);
        let persisted = snapshot(&[("/m/a.mp3", None, 100)]);

        let delta = diff(&current, &persisted);
        assert_eq!(paths(&delta.modified), vec!["/m/a.mp3"]);
    }

    #[test]
    fn test_identical_snapshots_are_noop() {
        let current = snapshot(&[("/m/a.mp3", Some(T1), 100), ("/m/b.mp3", Some(T1), 200)]);

        let delta = diff(&current, &current.clone());
        assert!(delta.is_noop());
        assert_eq!(delta.unchanged.len(), 2);
    }

    #[test]
    fn test_rename_is_delete_plus_add() {
        let current = snapshot(&[("/m/new.mp3", Some(T1), 100)]);
        let persisted = snapshot(&[("/m/old.mp3", Some(T1), 100)]);

        let delta = diff(&current, &persisted);
        assert_eq!(paths(&delta.added), vec!["/m/new.mp3"]);
        assert_eq!(delta.deleted, vec!["/m/old.mp3".to_string()]);
    }

    #[test]
    fn test_large_diff_is_fast() {
        let current: HashMap<String, FileFingerprint> = (0..100_000)
            .map(|i| {
                let path = format!("/m/{i:06}.mp3");
                let fp = FileFingerprint::new(path.clone(), Some(T1), i);
                (path, fp)
            })
            .collect();
        let persisted = current.clone();

        let start = std::time::Instant::now();
        let delta = diff(&current, &persisted);
        assert_eq!(delta.unchanged.len(), 100_000);
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }
}
