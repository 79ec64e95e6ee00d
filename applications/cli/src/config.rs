/// Application configuration
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tunesync_scanner::ScanConfig;

/// Default configuration file, read when present
pub const DEFAULT_CONFIG_FILE: &str = "tunesync.toml";

/// Prefix of environment overrides (`TUNESYNC_SCAN__WORKERS=4`)
pub const ENV_PREFIX: &str = "TUNESYNC";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Tracing filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub scan: ScanConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(
            path,
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load_with(path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Environment overrides the file
        settings = settings.add_source(environment);

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(CliError::Config("database_url must not be empty".to_string()));
        }
        if self.scan.progress_buffer == 0 {
            return Err(CliError::Config(
                "scan.progress_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Filesystem location of the SQLite database, if the URL names a file
    pub fn database_path(&self) -> Option<PathBuf> {
        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log_filter: default_log_filter(),
            scan: ScanConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://./data/tunesync.db".to_string()
}

fn default_log_filter() -> String {
    "tunesync=info,tunesync_scanner=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::load_with(None, env(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite://./data/tunesync.db");
        assert_eq!(config.scan, ScanConfig::default());
    }

    #[test]
    fn test_file_then_env_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tunesync.toml");
        fs::write(
            &path,
            r#"
database_url = "sqlite:///var/lib/tunesync/library.db"

[scan]
workers = 2
skip_hidden = false
"#,
        )
        .unwrap();

        let config = AppConfig::load_with(
            Some(&path),
            env(&[("TUNESYNC_SCAN__WORKERS", "6"), ("TUNESYNC_LOG_FILTER", "debug")]),
        )
        .unwrap();

        assert_eq!(config.database_url, "sqlite:///var/lib/tunesync/library.db");
        assert_eq!(config.scan.workers, 6);
        assert!(!config.scan.skip_hidden);
        assert_eq!(config.scan.parallel_threshold, 20);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = AppConfig::load_with(Some(Path::new("/nonexistent/tunesync.toml")), env(&[]));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_database_path() {
        let mut config = AppConfig::default();
        assert_eq!(config.database_path(), Some(PathBuf::from("./data/tunesync.db")));

        config.database_url = "sqlite:music.db?mode=rwc".to_string();
        assert_eq!(config.database_path(), Some(PathBuf::from("music.db")));

        config.database_url = "sqlite::memory:".to_string();
        assert_eq!(config.database_path(), None);
    }

    #[test]
    fn test_toml_rendering_reloads() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rendered.toml");
        fs::write(&path, rendered).unwrap();

        let reloaded = AppConfig::load_with(Some(&path), env(&[])).unwrap();
        assert_eq!(reloaded, config);
    }
}
