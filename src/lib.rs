//! Cadence-Crawl: a scheduled vendor API harvester
//!
//! This crate periodically crawls external vendor APIs, normalizes what they
//! return, and stores the records together with per-phase timing telemetry.
//! Each source runs a fixed four-phase pipeline (links, download, parse,
//! persist) and is re-run once its configured interval has elapsed since its
//! last completed run.

pub mod config;
pub mod crawler;
pub mod output;
pub mod sources;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Cadence-Crawl operations
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] storage::ScheduleError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Cadence-Crawl operations
pub type Result<T> = std::result::Result<T, CadenceError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlPipeline, Orchestrator, SourceAdapter};
pub use state::Phase;
pub use storage::{DocumentStore, ScheduleEntry, ScheduleStore, SqliteDocumentStore, TelemetryLog};
