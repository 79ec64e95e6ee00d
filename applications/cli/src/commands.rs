//! Command implementations shared by the binary

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::report;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tunesync_core::{ScanMode, WatchedFolderPatch};
use tunesync_scanner::{
    progress_channel, RunOptions, ScanOutcome, SyncContext, SyncOrchestrator,
    WatchedFolderScheduler,
};
use tunesync_storage::SqliteStore;

/// Open the database named by the configuration, creating it if needed
pub async fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    if let Some(parent) = config.database_path().and_then(|p| p.parent().map(PathBuf::from)) {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(&parent).await?;
        }
    }

    let pool = tunesync_storage::create_pool(&config.database_url).await?;
    tunesync_storage::run_migrations(&pool).await?;
    tracing::debug!("Database ready at {}", config.database_url);
    Ok(SqliteStore::new(pool))
}

pub fn orchestrator(store: &SqliteStore, config: &AppConfig) -> SyncOrchestrator {
    SyncOrchestrator::new(SyncContext::new(
        Arc::new(store.clone()),
        config.scan.clone(),
    ))
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, finishing files in flight");
            token.cancel();
        }
    });
}

/// Scan the given roots once
pub async fn scan(config: &AppConfig, roots: Vec<PathBuf>, force: bool) -> Result<ScanOutcome> {
    if roots.is_empty() {
        return Err(CliError::InvalidArgument(
            "at least one root is required".to_string(),
        ));
    }

    let store = open_store(config).await?;
    let (tx, rx) = progress_channel(&config.scan);
    let printer = report::spawn_printer(rx);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let options = RunOptions::default()
        .with_progress(tx)
        .with_cancel(cancel)
        .force_refresh(force);
    let result = orchestrator(&store, config).run(&roots, options).await;

    // The sender was moved into the run and is gone now
    let _ = printer.await;
    Ok(result?)
}

async fn scheduler(
    config: &AppConfig,
    progress: Option<tokio::sync::mpsc::Sender<tunesync_scanner::ProgressEvent>>,
) -> Result<WatchedFolderScheduler> {
    let store = open_store(config).await?;
    let orchestrator = orchestrator(&store, config);
    Ok(WatchedFolderScheduler::load(orchestrator, Arc::new(store), progress).await?)
}

/// Build a schedule from CLI flags
pub fn schedule(mode: ScanMode, every: Option<Duration>) -> Result<(ScanMode, Option<Duration>)> {
    tunesync_core::types::validate_schedule(mode, every).map_err(CliError::InvalidArgument)?;
    Ok((mode, every))
}

pub async fn add_folder(
    config: &AppConfig,
    path: PathBuf,
    mode: ScanMode,
    every: Option<Duration>,
    enabled: bool,
) -> Result<i64> {
    let (mode, cadence) = schedule(mode, every)?;
    let scheduler = scheduler(config, None).await?;
    Ok(scheduler.register(&path, mode, cadence, enabled).await?)
}

pub async fn list_folders(config: &AppConfig) -> Result<()> {
    let scheduler = scheduler(config, None).await?;
    let folders = scheduler.list().await;
    if folders.is_empty() {
        println!("No watched folders");
    }
    for folder in &folders {
        println!("{}", report::format_folder(folder));
    }
    Ok(())
}

pub async fn update_folder(config: &AppConfig, id: i64, patch: WatchedFolderPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(CliError::InvalidArgument("nothing to update".to_string()));
    }
    let scheduler = scheduler(config, None).await?;
    let folder = scheduler.update(id, patch).await?;
    println!("{}", report::format_folder(&folder));
    Ok(())
}

pub async fn remove_folder(config: &AppConfig, id: i64) -> Result<()> {
    let scheduler = scheduler(config, None).await?;
    scheduler.remove(id).await?;
    println!("Removed watched folder {}", id);
    Ok(())
}

/// Scan one watched folder now
pub async fn rescan(config: &AppConfig, id: i64) -> Result<ScanOutcome> {
    let (tx, rx) = progress_channel(&config.scan);
    let printer = report::spawn_printer(rx);
    let scheduler = scheduler(config, Some(tx)).await?;

    let handle = scheduler.rescan_now(id).await?;
    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling scan of watched folder {}", id);
            scheduler.cancel(id).await;
            wait_until_idle(&scheduler, id).await;
            return Err(CliError::Scan(tunesync_scanner::ScanError::Cancelled));
        }
    };

    drop(scheduler);
    let _ = printer.await;
    Ok(outcome?)
}

async fn wait_until_idle(scheduler: &WatchedFolderScheduler, id: i64) {
    while scheduler.is_running(id).await {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Run the scheduler until Ctrl-C
pub async fn watch(config: &AppConfig) -> Result<()> {
    let (tx, rx) = progress_channel(&config.scan);
    let printer = report::spawn_printer(rx);
    let scheduler = scheduler(config, Some(tx)).await?;

    for handle in scheduler.start().await {
        tokio::spawn(async move {
            let id = handle.folder_id;
            match handle.wait().await {
                Ok(outcome) => tracing::info!(
                    "Startup scan of watched folder {}: {}",
                    id,
                    report::format_stats(&outcome.stats)
                ),
                Err(e) => tracing::error!("Startup scan of watched folder {} failed: {}", id, e),
            }
        });
    }

    tracing::info!("Watching {} folder(s), press Ctrl-C to stop", scheduler.list().await.len());
    tokio::signal::ctrl_c().await?;

    scheduler.shutdown();
    for folder in scheduler.list().await {
        wait_until_idle(&scheduler, folder.id).await;
    }
    drop(scheduler);
    printer.abort();
    Ok(())
}

/// Parse a duration such as `90`, `30s`, `10m`, `2h` or `500ms`
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {input:?}"))?;

    let seconds = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("invalid duration: {input:?}"))
    };
    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => seconds(60)?,
        "h" => seconds(3600)?,
        other => return Err(format!("unknown duration unit {other:?} (use ms, s, m or h)")),
    };

    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("ten minutes").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        let huge = u64::MAX;
        assert!(parse_duration(&format!("{huge}m")).is_err());
        assert!(parse_duration(&format!("{huge}h")).is_err());
        assert_eq!(
            parse_duration(&format!("{huge}s")),
            Ok(Duration::from_secs(huge))
        );
    }

    #[test]
    fn test_schedule_validation() {
        assert!(schedule(ScanMode::Continuous, None).is_err());
        assert!(schedule(ScanMode::Startup, Some(Duration::from_secs(1))).is_err());
        assert!(schedule(ScanMode::Continuous, Some(Duration::from_secs(60))).is_ok());
    }

    #[tokio::test]
    async fn test_open_store_creates_database_directory() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("nested/dir/tunesync.db");
        let config = AppConfig {
            database_url: format!("sqlite://{}", db.display()),
            ..Default::default()
        };

        open_store(&config).await.unwrap();
        assert!(db.exists());
    }

    #[tokio::test]
    async fn test_folder_commands_round_trip() {
        let temp = TempDir::new().unwrap();
        let library = temp.path().join("library");
        std::fs::create_dir(&library).unwrap();
        let config = AppConfig {
            database_url: format!("sqlite://{}", temp.path().join("db.sqlite").display()),
            ..Default::default()
        };

        let id = add_folder(&config, library, ScanMode::Startup, None, true)
            .await
            .unwrap();
        update_folder(
            &config,
            id,
            WatchedFolderPatch {
                mode: Some(ScanMode::Continuous),
                cadence: Some(Some(Duration::from_secs(300))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let outcome = rescan(&config, id).await.unwrap();
        assert_eq!(outcome.stats.visited, 0);

        remove_folder(&config, id).await.unwrap();
        assert!(remove_folder(&config, id).await.is_err());
    }
}
