//! Scan phases and throttled progress delivery
//!
//! Progress travels over a bounded `tokio::sync::mpsc` channel. Every send is
//! a `try_send`: when the consumer falls behind, events are dropped instead of
//! stalling extraction.

use crate::{ScanConfig, ScanStats};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Lifecycle of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    Idle,
    Walking,
    Diffing,
    Parsing,
    Persisting,
    Failed,
}

impl ScanPhase {
    /// Whether `self -> next` is a legal transition
    ///
    /// `Parsing` may be skipped (Diffing -> Persisting) and every active
    /// phase may fail.
    pub fn can_transition_to(self, next: ScanPhase) -> bool {
        use ScanPhase::*;
        matches!(
            (self, next),
            (Idle | Failed, Walking)
                | (Walking, Diffing)
                | (Diffing, Parsing | Persisting)
                | (Parsing, Persisting)
                | (Persisting, Idle)
                | (Walking | Diffing | Parsing | Persisting, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walking => "walking",
            Self::Diffing => "diffing",
            Self::Parsing => "parsing",
            Self::Persisting => "persisting",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extraction progress snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressTick {
    pub processed: usize,
    pub total: usize,
    pub current_path: Option<String>,
    /// Files per second since parsing started
    pub rate: f64,
    pub eta_seconds: Option<f64>,
}

/// Event on the progress channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    Phase(ScanPhase),
    Tick(ProgressTick),
    Finished(ScanStats),
}

/// Create a progress channel sized from the scan configuration
pub fn progress_channel(
    config: &ScanConfig,
) -> (mpsc::Sender<ProgressEvent>, mpsc::Receiver<ProgressEvent>) {
    mpsc::channel(config.progress_buffer.max(1))
}

/// Producer side of the progress stream for one run
///
/// Tracks the current [`ScanPhase`] and rate-limits ticks to one per
/// `min_interval`. The last tick of a batch is always attempted.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    min_interval: Duration,
    phase: ScanPhase,
    parse_started: Instant,
    last_tick: Option<Instant>,
    dropped: u64,
}

impl ProgressReporter {
    pub fn new(tx: Option<mpsc::Sender<ProgressEvent>>, min_interval: Duration) -> Self {
        Self {
            tx,
            min_interval,
            phase: ScanPhase::Idle,
            parse_started: Instant::now(),
            last_tick: None,
            dropped: 0,
        }
    }

    /// Reporter with no consumer; tracks phases only
    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Number of events dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Move to `next`, announcing it on the channel
    ///
    /// Illegal transitions are logged and ignored.
    pub fn enter(&mut self, next: ScanPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Ignoring illegal scan phase transition {} -> {}", self.phase, next);
            return false;
        }

        tracing::debug!("Scan phase {} -> {}", self.phase, next);
        self.phase = next;
        if next == ScanPhase::Parsing {
            self.parse_started = Instant::now();
            self.last_tick = None;
        }
        self.send(ProgressEvent::Phase(next));
        true
    }

    /// Report extraction progress, subject to throttling
    pub fn tick(&mut self, processed: usize, total: usize, current_path: Option<&str>) {
        let now = Instant::now();
        let is_final = processed >= total;
        if !is_final {
            if let Some(last) = self.last_tick {
                if now.duration_since(last) < self.min_interval {
                    return;
                }
            }
        }
        self.last_tick = Some(now);

        let elapsed = now.duration_since(self.parse_started).as_secs_f64();
        let rate = if elapsed > 0.0 {
            processed as f64 / elapsed
        } else {
            0.0
        };
        let eta_seconds = (rate > 0.0).then(|| total.saturating_sub(processed) as f64 / rate);

        self.send(ProgressEvent::Tick(ProgressTick {
            processed,
            total,
            current_path: current_path.map(str::to_string),
            rate,
            eta_seconds,
        }));
    }

    pub fn finish(&mut self, stats: &ScanStats) {
        self.send(ProgressEvent::Finished(stats.clone()));
    }

    fn send(&mut self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Progress consumer went away, disabling progress events");
                self.tx = None;
            }
        }
    }
}
