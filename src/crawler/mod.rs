//! Crawler module for scheduled vendor harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with rate-limit classification
//! - The source adapter contract vendors implement
//! - The four-phase crawl pipeline
//! - The orchestrator that decides which sources are due

mod adapter;
mod fetcher;
mod pipeline;
mod scheduler;

pub use adapter::{
    AdapterError, FetchTarget, LinkContext, NormalizedRecord, ParseError, SourceAdapter,
};
pub use fetcher::{build_http_client, fetch_json, resolve, FetchError, FetchOutcome, RawPayload};
pub use pipeline::{CrawlPipeline, PipelineError, PipelineSettings, RunSummary, StageError};
pub use scheduler::{is_due, CycleReport, Orchestrator, RunOutcome};

use crate::config::Config;
use crate::storage::{DocumentStore, ScheduleStore, TelemetryLog};
use std::sync::Arc;
use std::time::Duration;

/// Runs one orchestration cycle for a loaded configuration
///
/// This is the main entry point for a one-shot run. It will:
/// 1. Build the shared HTTP client
/// 2. Build one pipeline per configured source
/// 3. Seed missing schedules from the configuration
/// 4. Run every due source to completion
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `store` - The document store shared by every component
///
/// # Returns
///
/// * `Ok(CycleReport)` - The cycle ran; individual sources may still have failed
/// * `Err(CadenceError)` - Setup failed or schedules could not be read
pub async fn run_once(config: &Config, store: Arc<dyn DocumentStore>) -> crate::Result<CycleReport> {
    let orchestrator = crate::sources::build_orchestrator(config, store)?;
    Ok(orchestrator.run_cycle().await?)
}

/// The schedule store named by the configuration
pub fn schedule_store(config: &Config, store: Arc<dyn DocumentStore>) -> ScheduleStore {
    ScheduleStore::new(store, &config.storage.schedule_collection)
}

/// The telemetry log using the configured collection prefix
pub fn telemetry_log(config: &Config, store: Arc<dyn DocumentStore>) -> TelemetryLog {
    TelemetryLog::new(store, &config.storage.telemetry_prefix)
}

pub(crate) fn run_deadline(config: &Config) -> Option<Duration> {
    config
        .orchestrator
        .run_deadline_secs
        .map(Duration::from_secs)
}
