//! Directory traversal for audio files
//!
//! [`PathWalker`] lazily enumerates candidate audio files under a root. A
//! failing subtree yields a [`ScanError::Traversal`] item and the walk
//! continues with the rest of the tree.

use crate::config::ScanConfig;
use crate::ScanError;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Supported audio file extensions
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "flac", "ogg", "wav", "aac", "wma", "opus", "ape", "aiff",
];

/// Check if a file has a supported audio extension (case-insensitive)
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Traversal options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Maximum depth below the root (root = 0)
    pub max_depth: Option<usize>,
    pub follow_symlinks: bool,
    pub skip_hidden: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            follow_symlinks: false,
            skip_hidden: true,
        }
    }
}

impl From<&ScanConfig> for WalkOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            follow_symlinks: config.follow_symlinks,
            skip_hidden: config.skip_hidden,
        }
    }
}

/// Walker over audio files
#[derive(Debug, Clone, Default)]
pub struct PathWalker {
    options: WalkOptions,
}

impl PathWalker {
    pub fn new(options: WalkOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Lazily walk `root`
    ///
    /// Every call starts a fresh traversal. The root itself is never
    /// filtered as hidden.
    pub fn walk(&self, root: &Path) -> Walk {
        let mut walker = WalkDir::new(root)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name();
        if let Some(depth) = self.options.max_depth {
            walker = walker.max_depth(depth);
        }

        let skip_hidden = self.options.skip_hidden;
        let inner = walker
            .into_iter()
            .filter_entry(move |entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry)));

        Walk {
            inner: Box::new(inner),
        }
    }

    /// Walk `root` to completion, splitting paths from traversal errors
    pub fn collect(&self, root: &Path) -> (Vec<PathBuf>, Vec<ScanError>) {
        let mut paths = Vec::new();
        let mut errors = Vec::new();
        for item in self.walk(root) {
            match item {
                Ok(path) => paths.push(path),
                Err(e) => errors.push(e),
            }
        }
        (paths, errors)
    }
}

/// Lazy sequence of audio file paths produced by [`PathWalker::walk`]
pub struct Walk {
    inner: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>,
}

impl Iterator for Walk {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    // Symlinks only report as files when they are being followed
                    if entry.file_type().is_file() && is_audio_file(entry.path()) {
                        return Some(Ok(entry.into_path()));
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    tracing::warn!("Traversal error at {}: {}", path.display(), e);
                    return Some(Err(ScanError::Traversal {
                        path,
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Optional native enumerator that can stand in for [`PathWalker`]
///
/// Implementations must return the same path set the walker would for the
/// same options. `None` means the accelerator is unavailable and the caller
/// falls back to the in-process walker.
pub trait WalkAccelerator: Send + Sync {
    fn name(&self) -> &str;

    fn enumerate(&self, root: &Path, options: &WalkOptions) -> Option<std::io::Result<Vec<PathBuf>>>;
}
