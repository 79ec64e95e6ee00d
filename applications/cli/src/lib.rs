//! Tunesync command line
//!
//! Wires configuration, logging, the SQLite store and the scanner together.
//! The binary in `main.rs` is a thin clap front end over [`commands`].

pub mod commands;
pub mod config;
pub mod error;
pub mod report;

pub use config::AppConfig;
pub use error::{CliError, Result};
