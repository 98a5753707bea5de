//! Source adapter contract
//!
//! A source adapter is the per-vendor plug-in the pipeline drives. It knows
//! how to enumerate fetch targets, fetch one target, and turn one payload into
//! normalized records. The pipeline only ever holds `Arc<dyn SourceAdapter>`.

use crate::crawler::fetcher::{FetchError, FetchOutcome, RawPayload};
use crate::storage::Document;
use async_trait::async_trait;
use thiserror::Error;

/// A normalized record, stored verbatim in the source's data collection
pub type NormalizedRecord = Document;

/// An opaque fetch handle produced by link creation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTarget(pub String);

impl FetchTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-run information handed to link creation
#[derive(Debug, Clone)]
pub struct LinkContext {
    pub source_name: String,
}

/// A payload could not be turned into records
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing or mistyped field '{field}'")]
    MissingField { field: String },

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl ParseError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// Link creation failures
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Rate limited while probing {url}; pagination bounds are unknown")]
    RateLimited { url: String },
}

/// The three operations every vendor adapter implements
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Produces the ordered list of targets to download
    ///
    /// May perform its own preliminary requests (e.g. to learn page counts).
    async fn create_links(&self, ctx: &LinkContext) -> Result<Vec<FetchTarget>, AdapterError>;

    /// Fetches one target
    async fn download(&self, target: &FetchTarget) -> Result<FetchOutcome, FetchError>;

    /// Turns one payload into zero or more records
    async fn parse(&self, payload: &RawPayload) -> Result<Vec<NormalizedRecord>, ParseError>;
}
