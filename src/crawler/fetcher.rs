//! HTTP fetcher implementation
//!
//! This module handles all vendor API requests, including:
//! - Building the shared HTTP client with a proper user agent string
//! - Resolving adapter paths against a source's base URL
//! - Classifying responses into payload, soft-empty, or hard failure

use crate::config::UserAgentConfig;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Raw vendor response body, opaque to the pipeline
pub type RawPayload = Value;

/// Non-failing result of a fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The vendor answered with a JSON body
    Payload(RawPayload),

    /// The vendor rate limited the request; counts as zero results
    SoftEmpty,
}

impl FetchOutcome {
    pub fn is_soft_empty(&self) -> bool {
        matches!(self, Self::SoftEmpty)
    }
}

/// Hard fetch failures; any of these aborts the current run
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} was rejected (HTTP 403), check the request headers")]
    Forbidden { url: String },

    #[error("Request to {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Cannot build request URL from '{path}': {source}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use cadence_crawl::config::UserAgentConfig;
/// use cadence_crawl::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "CadenceCrawl".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Resolves an adapter path (e.g. `/api/items?page=2`) against a base URL
pub fn resolve(base_url: &Url, path: &str) -> Result<Url, FetchError> {
    base_url.join(path).map_err(|source| FetchError::InvalidUrl {
        path: path.to_string(),
        source,
    })
}

/// Fetches a JSON document and classifies the response
///
/// | Response | Outcome |
/// |----------|---------|
/// | HTTP 200 | `Payload` with the decoded body |
/// | HTTP 429 | `SoftEmpty` |
/// | HTTP 403 | `FetchError::Forbidden` |
/// | Any other status | `FetchError::Status` |
/// | Connection/timeout | `FetchError::Network` |
pub async fn fetch_json(client: &Client, url: &Url) -> Result<FetchOutcome, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

    match response.status() {
        StatusCode::OK => {
            let body = response
                .json::<Value>()
                .await
                .map_err(|source| FetchError::Decode {
                    url: url.to_string(),
                    source,
                })?;
            Ok(FetchOutcome::Payload(body))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            tracing::warn!("Rate limited by {}, treating as empty", url);
            Ok(FetchOutcome::SoftEmpty)
        }
        StatusCode::FORBIDDEN => Err(FetchError::Forbidden {
            url: url.to_string(),
        }),
        status => Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }),
    }
}
