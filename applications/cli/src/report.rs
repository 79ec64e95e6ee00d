//! Human-readable rendering of scan progress and results

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tunesync_core::WatchedFolder;
use tunesync_scanner::{ProgressEvent, ScanOutcome, ScanStats};

/// One line for a progress event
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Phase(phase) => format!("[{}]", phase),
        ProgressEvent::Tick(tick) => {
            let eta = tick
                .eta_seconds
                .map(|s| format!(", eta {:.0}s", s))
                .unwrap_or_default();
            format!(
                "  {}/{} ({:.1} files/s{}) {}",
                tick.processed,
                tick.total,
                tick.rate,
                eta,
                tick.current_path.as_deref().unwrap_or("")
            )
        }
        ProgressEvent::Finished(stats) => format!("[done] {}", format_stats(stats)),
    }
}

pub fn format_stats(stats: &ScanStats) -> String {
    let mut line = format!(
        "{} visited, {} added, {} modified, {} unchanged, {} deleted, {} errors ({} ms)",
        stats.visited,
        stats.added,
        stats.modified,
        stats.unchanged,
        stats.deleted,
        stats.errors,
        stats.elapsed_ms
    );
    if stats.degraded > 0 {
        line.push_str(&format!(", {} without tags", stats.degraded));
    }
    if stats.cancelled {
        line.push_str(&format!(", cancelled with {} unparsed", stats.skipped));
    }
    line
}

pub fn format_folder(folder: &WatchedFolder) -> String {
    let cadence = folder
        .cadence
        .map(|c| format!(" every {}s", c.as_secs()))
        .unwrap_or_default();
    let status = if folder.enabled { "" } else { " (disabled)" };
    let scanned = folder
        .last_scanned_at
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| format!(", last scanned {}", dt.format("%Y-%m-%d %H:%M:%S UTC")))
        .unwrap_or_default();
    format!(
        "{:>4}  {}  [{}{}]{}{}",
        folder.id, folder.path, folder.mode, cadence, status, scanned
    )
}

/// Print the outcome of a run, including its recovered errors
pub fn print_outcome(outcome: &ScanOutcome) {
    println!("{}", format_stats(&outcome.stats));
    for error in &outcome.errors {
        println!("  ! {}", error);
    }
}

/// Print progress events to stderr until the channel closes
pub fn spawn_printer(mut rx: mpsc::Receiver<ProgressEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            eprintln!("{}", format_event(&event));
        }
    })
}
