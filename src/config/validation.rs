use crate::config::types::{
    Config, OrchestratorConfig, RateLimitPolicy, ScheduleSeed, SourceConfig, SourceKind,
    StorageConfig, UserAgentConfig,
};
use crate::storage::{collection_name, Interval};
use crate::{ConfigError, ConfigResult};
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_orchestrator_config(&config.orchestrator)?;
    validate_storage_config(&config.storage)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_sources(&config.sources)?;
    validate_schedules(&config.schedules, &config.sources)?;
    Ok(())
}

fn validate_orchestrator_config(config: &OrchestratorConfig) -> ConfigResult<()> {
    if config.tick_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "tick_interval_secs must be >= 1".to_string(),
        ));
    }

    if config.run_deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run_deadline_secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    for (label, value) in [
        ("telemetry_prefix", &config.telemetry_prefix),
        ("data_prefix", &config.data_prefix),
        ("schedule_collection", &config.schedule_collection),
    ] {
        if !is_identifier(value) {
            return Err(ConfigError::Validation(format!(
                "{} must be a non-empty identifier of [A-Za-z0-9_-], got '{}'",
                label, value
            )));
        }
    }

    if config.telemetry_prefix == config.data_prefix {
        return Err(ConfigError::Validation(format!(
            "telemetry_prefix and data_prefix must differ, both are '{}'",
            config.data_prefix
        )));
    }

    validate_collection_namespaces(config)
}

/// Keeps telemetry, data and schedule collections apart for any source name
///
/// `<prefix>_<source>` names from the two prefixes can only meet when one
/// prefix starts with the other followed by `_` (`time` and `time_x` both
/// produce `time_x_a`). The schedule collection must not look like a
/// per-source collection either.
fn validate_collection_namespaces(config: &StorageConfig) -> ConfigResult<()> {
    let namespaces = [
        ("telemetry_prefix", &config.telemetry_prefix),
        ("data_prefix", &config.data_prefix),
    ];

    for (label, prefix) in namespaces {
        let marker = collection_name(prefix, "");
        for (other_label, other) in namespaces {
            if label != other_label && other.starts_with(&marker) {
                return Err(ConfigError::Validation(format!(
                    "{} '{}' starts with {} '{}' plus '_', their collections can collide",
                    other_label, other, label, prefix
                )));
            }
        }

        if config.schedule_collection.starts_with(&marker) {
            return Err(ConfigError::Validation(format!(
                "schedule_collection '{}' lies inside the {} namespace '{}'",
                config.schedule_collection, label, marker
            )));
        }
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_sources(sources: &[SourceConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for source in sources {
        if !is_identifier(&source.name) {
            return Err(ConfigError::Validation(format!(
                "Source name must be a non-empty identifier of [A-Za-z0-9_-], got '{}'",
                source.name
            )));
        }

        if !seen.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Source '{}' is defined more than once",
                source.name
            )));
        }

        let url = Url::parse(&source.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid base-url '{}' for source '{}': {}",
                source.base_url, source.name, e
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Source '{}' base-url must use http or https",
                source.name
            )));
        }

        if source.max_concurrent_requests < 1 || source.max_concurrent_requests > 100 {
            return Err(ConfigError::Validation(format!(
                "max_concurrent_requests for '{}' must be between 1 and 100, got {}",
                source.name, source.max_concurrent_requests
            )));
        }

        if source.rate_limit.policy == RateLimitPolicy::Retry && source.rate_limit.max_retries < 1 {
            return Err(ConfigError::Validation(format!(
                "Source '{}' uses the retry policy but max_retries is 0",
                source.name
            )));
        }

        match source.kind {
            SourceKind::CouponListing => {
                if source.category_id.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Validation(format!(
                        "coupon-listing source '{}' requires category-id",
                        source.name
                    )));
                }
            }
            SourceKind::ProductSearch => {
                if source.categories.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "product-search source '{}' requires at least one category",
                        source.name
                    )));
                }

                if source.max_pages_per_category < 1 {
                    return Err(ConfigError::Validation(format!(
                        "max_pages_per_category for '{}' must be >= 1",
                        source.name
                    )));
                }

                for category in &source.categories {
                    if category.slug.is_empty() || category.max_page < 1 {
                        return Err(ConfigError::Validation(format!(
                            "Category '{}' of '{}' needs a slug and max-page >= 1",
                            category.slug, source.name
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

fn validate_schedules(seeds: &[ScheduleSeed], sources: &[SourceConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for seed in seeds {
        if !sources.iter().any(|s| s.name == seed.source_name) {
            return Err(ConfigError::Validation(format!(
                "Schedule names unknown source '{}'",
                seed.source_name
            )));
        }

        if !seen.insert(seed.source_name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Source '{}' is scheduled more than once",
                seed.source_name
            )));
        }

        let interval = Interval::new(seed.days, seed.hours, seed.minutes, seed.seconds);
        if interval.checked_total_seconds().is_none() {
            return Err(ConfigError::Validation(format!(
                "Schedule interval for '{}' is too large",
                seed.source_name
            )));
        }
    }

    Ok(())
}

/// True for names usable inside a collection name
pub(crate) fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Basic email validation
fn validate_email(email: &str) -> ConfigResult<()> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
