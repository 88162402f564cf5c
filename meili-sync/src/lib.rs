//! # Meili Sync
//!
//! Command line front end for the entity synchronizer.
//!
//! This crate loads the TOML configuration, wires the Meilisearch client,
//! the index manager and the JSON file data sources together, and exposes
//! the maintenance commands (create, clear, delete, import, update-settings).

pub mod commands;
pub mod config;
pub mod sources;

pub use config::{Dependencies, FileConfig};

use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Synchronization error.
    #[error("Sync error: {0}")]
    SyncError(#[from] meili_sync_manager::SyncError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] meili_sync_repository::SearchError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CliError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
