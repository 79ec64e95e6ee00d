/// Tunesync - incremental music library sync
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tunesync_cli::commands::{self, parse_duration};
use tunesync_cli::{report, AppConfig};
use tunesync_core::{ScanMode, WatchedFolderPatch};

#[derive(Parser)]
#[command(name = "tunesync")]
#[command(about = "Keep a music library database in sync with folders on disk", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ./tunesync.toml when present)
    #[arg(short, long, global = true, env = "TUNESYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one or more directories once
    Scan {
        /// Root directories to scan
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// Re-read tags of unchanged files too
        #[arg(long)]
        force: bool,
    },
    /// Manage watched folders
    #[command(subcommand)]
    Folders(FolderCommands),
    /// Scan a watched folder now
    Rescan {
        /// Watched folder id
        id: i64,
    },
    /// Run startup scans and scheduled rescans until interrupted
    Watch,
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum FolderCommands {
    /// Register a folder
    Add {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Mode::Startup)]
        mode: Mode,
        /// Rescan cadence for continuous folders (e.g. 30s, 10m, 2h)
        #[arg(long, value_parser = parse_duration)]
        every: Option<Duration>,
        /// Register without scheduling it
        #[arg(long)]
        disabled: bool,
    },
    /// List registered folders
    List,
    /// Change fields of a registered folder
    Update(UpdateArgs),
    /// Unregister a folder
    Remove { id: i64 },
}

#[derive(Args)]
struct UpdateArgs {
    id: i64,
    #[arg(long)]
    path: Option<String>,
    #[arg(long, value_enum)]
    mode: Option<Mode>,
    #[arg(long, value_parser = parse_duration, conflicts_with = "no_cadence")]
    every: Option<Duration>,
    /// Clear the cadence (for switching to startup mode)
    #[arg(long)]
    no_cadence: bool,
    #[arg(long, conflicts_with = "disable")]
    enable: bool,
    #[arg(long)]
    disable: bool,
}

impl UpdateArgs {
    fn into_patch(self) -> (i64, WatchedFolderPatch) {
        let cadence = if self.no_cadence {
            Some(None)
        } else {
            self.every.map(Some)
        };
        let enabled = match (self.enable, self.disable) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        let patch = WatchedFolderPatch {
            path: self.path,
            mode: self.mode.map(ScanMode::from),
            cadence,
            enabled,
        };
        (self.id, patch)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Startup,
    Continuous,
}

impl From<Mode> for ScanMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Startup => ScanMode::Startup,
            Mode::Continuous => ScanMode::Continuous,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Scan { roots, force } => {
            let outcome = commands::scan(&config, roots, force).await?;
            report::print_outcome(&outcome);
        }
        Commands::Folders(FolderCommands::Add {
            path,
            mode,
            every,
            disabled,
        }) => {
            let id = commands::add_folder(&config, path, mode.into(), every, !disabled).await?;
            println!("Registered watched folder {}", id);
        }
        Commands::Folders(FolderCommands::List) => {
            commands::list_folders(&config).await?;
        }
        Commands::Folders(FolderCommands::Update(args)) => {
            let (id, patch) = args.into_patch();
            commands::update_folder(&config, id, patch).await?;
        }
        Commands::Folders(FolderCommands::Remove { id }) => {
            commands::remove_folder(&config, id).await?;
        }
        Commands::Rescan { id } => {
            let outcome = commands::rescan(&config, id).await?;
            report::print_outcome(&outcome);
        }
        Commands::Watch => {
            commands::watch(&config).await?;
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
