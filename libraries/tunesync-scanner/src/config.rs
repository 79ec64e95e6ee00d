/// Scan configuration
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for walking, extraction and progress reporting
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Maximum directory depth below a root (root = 0); `None` is unlimited
    #[serde(default)]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub follow_symlinks: bool,

    /// Skip dot-prefixed files and directories
    #[serde(default = "default_skip_hidden")]
    pub skip_hidden: bool,

    /// Size of the extraction worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Batches smaller than this are parsed serially
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Minimum gap between progress ticks
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Capacity of the progress channel created by `progress_channel`
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,
}

impl ScanConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Worker count clamped to at least one
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            follow_symlinks: false,
            skip_hidden: default_skip_hidden(),
            workers: default_workers(),
            parallel_threshold: default_parallel_threshold(),
            progress_interval_ms: default_progress_interval_ms(),
            progress_buffer: default_progress_buffer(),
        }
    }
}

fn default_skip_hidden() -> bool {
    true
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_parallel_threshold() -> usize {
    20
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_progress_buffer() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.max_depth, None);
        assert!(!config.follow_symlinks);
        assert!(config.skip_hidden);
        assert_eq!(config.parallel_threshold, 20);
        assert_eq!(config.progress_interval(), Duration::from_millis(100));
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn test_zero_workers_clamped() {
        let config = ScanConfig {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 1);
    }
}
