//! Tunesync Storage
//!
//! `SQLite` persistence for track records and watched folders.
//!
//! # Architecture
//!
//! - **Vertical Slicing**: `tracks` and `watched_folders` own their queries
//! - **Store Context**: `SqliteStore` implements the core `TrackStore` and
//!   `WatchedFolderStore` traits on top of those slices
//!
//! # Example
//!
//! ```rust,no_run
//! use tunesync_storage::{create_pool, run_migrations, SqliteStore};
//! use tunesync_core::TrackStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool("sqlite://tunesync.db").await?;
//! run_migrations(&pool).await?;
//!
//! let store = SqliteStore::new(pool);
//! let known = store.get_all_fingerprints().await?;
//! # Ok(())
//! # }
//! ```

mod context;

pub mod tracks;
pub mod watched_folders;

pub use context::SqliteStore;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// # Errors
///
/// Returns an error if migrations fail to run
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://tunesync.db>`)
///
/// # Errors
///
/// Returns an error if the connection fails
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    tracing::debug!("Creating pool with URL: {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}
