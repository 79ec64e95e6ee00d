//! Watched folder types
//!
//! A watched folder is a registered library root with its own scan cadence,
//! distinct from ad-hoc scans of arbitrary paths.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A registered library root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedFolder {
    /// Unique ID
    pub id: i64,

    /// Absolute root path
    pub path: String,

    /// When scans are triggered
    pub mode: ScanMode,

    /// Interval between scans; present iff `mode` is `Continuous`
    pub cadence: Option<Duration>,

    /// Disabled folders keep their registration but never fire
    pub enabled: bool,

    /// Completion time of the last successful scan (Unix epoch seconds)
    pub last_scanned_at: Option<i64>,
}

/// Scan trigger policy for a watched folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Scanned once when the scheduler starts
    #[default]
    Startup,
    /// Scanned every `cadence` while enabled
    Continuous,
}

impl ScanMode {
    /// Convert to string for database storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Continuous => "continuous",
        }
    }

    /// Parse from string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "startup" => Some(Self::Startup),
            "continuous" => Some(Self::Continuous),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check the mode/cadence pairing: a non-zero cadence is required iff continuous
pub fn validate_schedule(mode: ScanMode, cadence: Option<Duration>) -> Result<(), String> {
    match (mode, cadence) {
        (ScanMode::Continuous, None) => Err("continuous folders require a cadence".to_string()),
        (ScanMode::Continuous, Some(c)) if c.is_zero() => {
            Err("cadence must be greater than zero".to_string())
        }
        (ScanMode::Startup, Some(_)) => Err("startup folders do not take a cadence".to_string()),
        _ => Ok(()),
    }
}

/// Request to register a watched folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWatchedFolder {
    pub path: String,
    pub mode: ScanMode,
    pub cadence: Option<Duration>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Partial update of a watched folder; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchedFolderPatch {
    pub path: Option<String>,
    pub mode: Option<ScanMode>,
    /// `Some(None)` clears the cadence
    pub cadence: Option<Option<Duration>>,
    pub enabled: Option<bool>,
}

impl WatchedFolderPatch {
    /// Whether the patch touches no field at all
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.mode.is_none() && self.cadence.is_none() && self.enabled.is_none()
    }

    /// Apply the patch to a copy of `folder`
    #[must_use]
    pub fn apply_to(&self, folder: &WatchedFolder) -> WatchedFolder {
        let mut next = folder.clone();
        if let Some(path) = &self.path {
            next.path = path.clone();
        }
        if let Some(mode) = self.mode {
            next.mode = mode;
        }
        if let Some(cadence) = self.cadence {
            next.cadence = cadence;
        }
        if let Some(enabled) = self.enabled {
            next.enabled = enabled;
        }
        next
    }
}
