use serde::Deserialize;

/// Main configuration structure for Cadence-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    pub storage: StorageConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
    #[serde(default, rename = "schedule")]
    pub schedules: Vec<ScheduleSeed>,
}

impl Config {
    /// Looks up a source definition by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Orchestration cycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between cycles when running in watch mode
    #[serde(rename = "tick-interval-secs", default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Upper bound on a single pipeline run, in seconds
    #[serde(rename = "run-deadline-secs", default)]
    pub run_deadline_secs: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            run_deadline_secs: None,
        }
    }
}

fn default_tick_interval() -> u64 {
    60
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Prefix of the per-source telemetry collections
    #[serde(rename = "telemetry-prefix", default = "default_telemetry_prefix")]
    pub telemetry_prefix: String,

    /// Prefix of the per-source data collections
    #[serde(rename = "data-prefix", default = "default_data_prefix")]
    pub data_prefix: String,

    /// Name of the shared schedule collection
    #[serde(rename = "schedule-collection", default = "default_schedule_collection")]
    pub schedule_collection: String,
}

fn default_telemetry_prefix() -> String {
    "time".to_string()
}

fn default_data_prefix() -> String {
    "data".to_string()
}

fn default_schedule_collection() -> String {
    "schedule".to_string()
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// The adapter family a source is crawled with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Paginated coupon listing followed by one detail request per coupon
    CouponListing,
    /// Category search pages, each carrying a list of products
    ProductSearch,
}

/// A single crawled vendor
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique source name; also namespaces the source's collections
    pub name: String,

    pub kind: SourceKind,

    /// Base URL that adapter paths are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Ceiling on in-flight requests during download and parse fan-out
    #[serde(rename = "max-concurrent-requests", default = "default_concurrency")]
    pub max_concurrent_requests: usize,

    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,

    /// Listing category (coupon-listing only)
    #[serde(rename = "category-id", default)]
    pub category_id: Option<String>,

    /// Categories to search (product-search only)
    #[serde(rename = "category", default)]
    pub categories: Vec<CategoryEntry>,

    /// Hard cap on pages requested per category (product-search only)
    #[serde(rename = "max-pages-per-category", default = "default_page_cap")]
    pub max_pages_per_category: u32,
}

fn default_concurrency() -> usize {
    20
}

fn default_page_cap() -> u32 {
    9
}

/// A product-search category
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub slug: String,

    /// Last page worth requesting for this category
    #[serde(rename = "max-page")]
    pub max_page: u32,
}

/// What to do when a vendor answers with HTTP 429
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitPolicy {
    /// Count the target as an empty result
    #[default]
    Drop,
    /// Re-issue the request with exponential backoff before giving up
    Retry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub policy: RateLimitPolicy,

    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds, doubled on every retry
    #[serde(rename = "backoff-ms", default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            policy: RateLimitPolicy::default(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

/// Schedule entry seeded into the schedule collection when absent
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSeed {
    #[serde(rename = "source-name")]
    pub source_name: String,
    #[serde(default)]
    pub days: u64,
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
}
