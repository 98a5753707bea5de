//! Vendor adapters and the registry that wires them into pipelines
//!
//! Every `[[source]]` entry in the configuration names an adapter kind. This
//! module turns those entries into adapters, wraps each in a `CrawlPipeline`
//! and registers the pipelines with an `Orchestrator`.

mod coupon;
mod product;

pub use coupon::CouponListingAdapter;
pub use product::ProductSearchAdapter;

use crate::config::{Config, SourceConfig, SourceKind};
use crate::crawler::{
    build_http_client, run_deadline, schedule_store, telemetry_log, CrawlPipeline, Orchestrator,
    PipelineSettings, SourceAdapter,
};
use crate::storage::{DocumentStore, Interval, ScheduleEntry, ScheduleError, ScheduleStore};
use crate::ConfigError;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Builds the adapter for one configured source
pub fn build_adapter(source: &SourceConfig, client: Client) -> crate::Result<Arc<dyn SourceAdapter>> {
    let base_url = Url::parse(&source.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("'{}' for source '{}': {}", source.base_url, source.name, e))
    })?;

    let adapter: Arc<dyn SourceAdapter> = match source.kind {
        SourceKind::CouponListing => {
            let category_id = source.category_id.clone().ok_or_else(|| {
                ConfigError::Validation(format!("source '{}' has no category-id", source.name))
            })?;
            Arc::new(CouponListingAdapter::new(
                client,
                base_url,
                category_id,
                source.max_concurrent_requests,
            ))
        }
        SourceKind::ProductSearch => Arc::new(ProductSearchAdapter::new(
            client,
            base_url,
            source.categories.clone(),
            source.max_pages_per_category,
        )),
    };
    Ok(adapter)
}

/// Creates every configured schedule that is not stored yet
///
/// Existing entries are left untouched, so intervals changed through the
/// schedule commands survive restarts. Returns how many entries were created.
pub fn seed_schedules(config: &Config, schedules: &ScheduleStore) -> Result<usize, ScheduleError> {
    let mut created = 0;
    for seed in &config.schedules {
        let entry = ScheduleEntry::new(
            seed.source_name.clone(),
            Interval::new(seed.days, seed.hours, seed.minutes, seed.seconds),
        );
        if schedules.ensure(&entry)? {
            tracing::info!(source = %entry.source_name, "Seeded schedule from configuration");
            created += 1;
        }
    }
    Ok(created)
}

/// Builds an orchestrator with one registered pipeline per configured source
///
/// Schedules are seeded first. The HTTP client is built once and shared by
/// every adapter.
pub fn build_orchestrator(config: &Config, store: Arc<dyn DocumentStore>) -> crate::Result<Orchestrator> {
    let schedules = schedule_store(config, store.clone());
    seed_schedules(config, &schedules)?;

    let client = build_http_client(&config.user_agent)?;
    let telemetry = telemetry_log(config, store.clone());

    let mut orchestrator =
        Orchestrator::new(schedules, telemetry.clone()).with_run_deadline(run_deadline(config));
    for source in &config.sources {
        let adapter = build_adapter(source, client.clone())?;
        orchestrator.register(CrawlPipeline::new(
            source.name.clone(),
            adapter,
            store.clone(),
            telemetry.clone(),
            &config.storage.data_prefix,
            PipelineSettings::from_source(source),
        ));
        tracing::debug!(source = %source.name, kind = ?source.kind, "Registered source");
    }

    Ok(orchestrator)
}
