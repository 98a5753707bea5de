//! Configuration module for Cadence-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use cadence_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("cadence.toml")).unwrap();
//! println!("Crawling {} sources", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryEntry, Config, OrchestratorConfig, RateLimitConfig, RateLimitPolicy, ScheduleSeed,
    SourceConfig, SourceKind, StorageConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub(crate) use validation::is_identifier;
