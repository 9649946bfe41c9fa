//! Command-line interface parsing for Azure UpdateSnap
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into a validated [`StartupConfig`] plus the store it names.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;

use crate::cache::{FileStore, MemoryStore, SqliteStore, StoreError, UpdateStore};
use crate::config::{
    Config, ConfigError, DEFAULT_MEMORY_CAPACITY, DEFAULT_MEMORY_TTL_SECS, DEFAULT_TTL_HOURS,
    DEFAULT_UPSTREAM_BASE_URL,
};

/// Error types for CLI startup
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No home directory to derive a cache location from
    #[error("Could not determine a cache directory; pass --database")]
    NoCacheDir,

    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),
}

/// Which persistent store backs the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process-local map, gone when the command exits
    Memory,
    /// One JSON file per update
    File,
    /// SQLite database
    Sqlite,
}

/// Azure UpdateSnap - look up and cache Azure update announcements
#[derive(Parser, Debug)]
#[command(name = "updatesnap")]
#[command(about = "Look up, cache and serve Azure update announcements")]
#[command(version)]
pub struct Cli {
    /// Hours a fetched update stays fresh
    #[arg(long, global = true, env = "UPDATESNAP_TTL_HOURS", default_value_t = DEFAULT_TTL_HOURS)]
    pub ttl_hours: u64,

    /// Base URL of the release-communications API
    #[arg(long, global = true, env = "UPDATESNAP_UPSTREAM_BASE_URL", default_value = DEFAULT_UPSTREAM_BASE_URL)]
    pub upstream_base_url: String,

    /// Persistent store backend
    #[arg(long, global = true, value_enum, env = "UPDATESNAP_STORE", default_value_t = StoreKind::File)]
    pub store: StoreKind,

    /// Cache directory (file store) or database file (sqlite store)
    #[arg(long, global = true, env = "UPDATESNAP_DATABASE", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Seconds an update stays in the in-process cache (0 disables it)
    #[arg(long, global = true, default_value_t = DEFAULT_MEMORY_TTL_SECS)]
    pub memory_ttl_secs: u64,

    /// Maximum updates held in the in-process cache (0 disables it)
    #[arg(long, global = true, default_value_t = DEFAULT_MEMORY_CAPACITY)]
    pub memory_capacity: usize,

    /// Total attempts per upstream fetch
    #[arg(long, global = true, default_value_t = 1)]
    pub retry_attempts: u32,

    /// Backoff unit between attempts, in milliseconds
    #[arg(long, global = true, default_value_t = 500)]
    pub retry_delay_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print one or more updates
    ///
    /// Examples:
    ///   updatesnap show 123456
    ///   updatesnap show 3f2504e0-4f89-11d3-9a0c-0305e82c3301 --json
    Show {
        /// Numeric ids or GUIDs
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Delete expired entries from the store
    Sweep,
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        listen: SocketAddr,
    },
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// Validated runtime settings
    pub config: Config,
    /// Selected store backend
    pub store: StoreKind,
    /// Explicit store location, if any
    pub database: Option<PathBuf>,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError::Config)` if a setting is unusable
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let config = Config {
            ttl_hours: cli.ttl_hours,
            upstream_base_url: cli.upstream_base_url.clone(),
            memory_ttl_secs: cli.memory_ttl_secs,
            memory_capacity: cli.memory_capacity,
            retry_attempts: cli.retry_attempts,
            retry_delay_ms: cli.retry_delay_ms,
        }
        .validate()?;

        Ok(StartupConfig {
            config,
            store: cli.store,
            database: cli.database.clone(),
        })
    }

    /// Opens the selected store
    pub async fn open_store(&self) -> Result<Arc<dyn UpdateStore>, CliError> {
        let store: Arc<dyn UpdateStore> = match self.store {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::File => match &self.database {
                Some(dir) => Arc::new(FileStore::with_dir(dir.clone())),
                None => Arc::new(FileStore::new().ok_or(CliError::NoCacheDir)?),
            },
            StoreKind::Sqlite => {
                let path = match &self.database {
                    Some(path) => path.clone(),
                    None => SqliteStore::default_path().ok_or(CliError::NoCacheDir)?,
                };
                Arc::new(SqliteStore::open(path).await?)
            }
        };
        Ok(store)
    }
}
