//! Crawl pipeline - drives one source adapter through its four phases
//!
//! A run walks links-created, links-downloaded, data-parsed and data-saved
//! strictly in order. Download and parse fan out over targets and payloads
//! with a bounded number of in-flight futures. After each phase one
//! `PhaseRecord` is appended; a phase that fails leaves no record.
//! Store and telemetry writes run on the blocking pool.

use crate::config::{RateLimitConfig, RateLimitPolicy, SourceConfig};
use crate::crawler::adapter::{
    AdapterError, FetchTarget, LinkContext, NormalizedRecord, ParseError, SourceAdapter,
};
use crate::crawler::fetcher::{FetchError, FetchOutcome, RawPayload};
use crate::state::Phase;
use crate::storage::{collection_name, run_blocking, DocumentStore, StorageError, TelemetryLog};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a phase could not complete
#[derive(Debug, Error)]
pub enum StageError {
    #[error("link creation failed: {0}")]
    Links(#[from] AdapterError),

    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// A run that stopped in `phase`
#[derive(Debug, Error)]
#[error("{source_name}: {phase} failed: {cause}")]
pub struct PipelineError {
    pub source_name: String,
    pub phase: Phase,
    #[source]
    pub cause: StageError,
}

/// Volume counters of a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub targets: usize,
    pub payloads: usize,
    pub soft_empty: usize,
    pub records: usize,
}

/// Per-source tuning of the fan-out phases
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Ceiling on in-flight downloads and parses
    pub concurrency: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: 20,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_source(source: &SourceConfig) -> Self {
        Self {
            concurrency: source.max_concurrent_requests.max(1),
            rate_limit: source.rate_limit.clone(),
        }
    }
}

/// Runs one source's crawl and records its telemetry
pub struct CrawlPipeline {
    source_name: String,
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<dyn DocumentStore>,
    telemetry: TelemetryLog,
    data_collection: String,
    settings: PipelineSettings,
}

impl CrawlPipeline {
    /// Creates a pipeline writing records to `<data_prefix>_<source_name>`
    pub fn new(
        source_name: impl Into<String>,
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<dyn DocumentStore>,
        telemetry: TelemetryLog,
        data_prefix: &str,
        settings: PipelineSettings,
    ) -> Self {
        let source_name = source_name.into();
        let data_collection = collection_name(data_prefix, &source_name);
        Self {
            source_name,
            adapter,
            store,
            telemetry,
            data_collection,
            settings,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Executes one full run
    ///
    /// Returns the run's volume counters, or the phase that failed and why.
    /// Nothing is retried here; a failed run simply leaves no `data-saved`
    /// record, so the next cycle picks the source up again.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let ctx = LinkContext {
            source_name: self.source_name.clone(),
        };
        let mut summary = RunSummary::default();

        // Phase 1: link creation
        let started = Instant::now();
        let targets = self
            .adapter
            .create_links(&ctx)
            .await
            .map_err(|e| self.fail(Phase::LinksCreated, e))?;
        summary.targets = targets.len();
        self.complete(Phase::LinksCreated, started.elapsed(), targets.len())
            .await?;

        // Phase 2: download
        let started = Instant::now();
        let downloads: Vec<_> = targets
            .iter()
            .map(|target| self.download_with_policy(target))
            .collect();
        let outcomes: Vec<FetchOutcome> = stream::iter(downloads)
            .buffered(self.settings.concurrency)
            .try_collect()
            .await
            .map_err(|e| self.fail(Phase::LinksDownloaded, e))?;

        let payloads: Vec<RawPayload> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                FetchOutcome::Payload(payload) => Some(payload),
                FetchOutcome::SoftEmpty => {
                    summary.soft_empty += 1;
                    None
                }
            })
            .collect();
        summary.payloads = payloads.len();
        self.complete(Phase::LinksDownloaded, started.elapsed(), payloads.len())
            .await?;

        // Phase 3: parse
        let started = Instant::now();
        let parses: Vec<_> = payloads
            .iter()
            .map(|payload| self.adapter.parse(payload))
            .collect();
        let batches: Vec<Vec<NormalizedRecord>> = stream::iter(parses)
            .buffered(self.settings.concurrency)
            .try_collect()
            .await
            .map_err(|e| self.fail(Phase::DataParsed, e))?;
        let records: Vec<NormalizedRecord> = batches.into_iter().flatten().collect();
        summary.records = records.len();
        self.complete(Phase::DataParsed, started.elapsed(), records.len())
            .await?;

        // Phase 4: persist
        let started = Instant::now();
        let store = self.store.clone();
        let collection = self.data_collection.clone();
        run_blocking(move || store.store(&collection, &records))
            .await
            .map_err(|e| self.fail(Phase::DataSaved, e))?;
        self.complete(Phase::DataSaved, started.elapsed(), summary.records)
            .await?;

        tracing::info!(
            source = %self.source_name,
            targets = summary.targets,
            soft_empty = summary.soft_empty,
            records = summary.records,
            "Run completed"
        );

        Ok(summary)
    }

    /// Downloads a target, re-issuing rate-limited requests when the policy asks for it
    async fn download_with_policy(&self, target: &FetchTarget) -> Result<FetchOutcome, FetchError> {
        let policy = &self.settings.rate_limit;
        let mut attempt: u32 = 0;

        loop {
            let outcome = self.adapter.download(target).await?;
            if !outcome.is_soft_empty()
                || policy.policy == RateLimitPolicy::Drop
                || attempt >= policy.max_retries
            {
                if outcome.is_soft_empty() {
                    tracing::warn!(source = %self.source_name, %target, "Dropping rate-limited target");
                }
                return Ok(outcome);
            }

            let backoff = backoff_delay(policy.backoff_ms, attempt);
            tracing::debug!(
                source = %self.source_name,
                %target,
                attempt = attempt + 1,
                "Rate limited, retrying in {:?}",
                backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn complete(
        &self,
        phase: Phase,
        elapsed: Duration,
        volume: usize,
    ) -> Result<(), PipelineError> {
        let telemetry = self.telemetry.clone();
        let source_name = self.source_name.clone();
        run_blocking(move || telemetry.record(&source_name, phase, elapsed))
            .await
            .map_err(|e| self.fail(phase, e))?;

        tracing::info!(
            source = %self.source_name,
            phase = %phase,
            elapsed_ms = elapsed.as_millis() as u64,
            volume,
            "Phase complete"
        );
        Ok(())
    }

    fn fail(&self, phase: Phase, cause: impl Into<StageError>) -> PipelineError {
        PipelineError {
            source_name: self.source_name.clone(),
            phase,
            cause: cause.into(),
        }
    }
}

/// Exponential backoff: `base_ms * 2^attempt`, capped at 2^16 multiples
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(16)))
}
