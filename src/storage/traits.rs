//! Storage traits and error types
//!
//! This module defines the narrow document-store interface the rest of the
//! crate is written against, the equality filter it accepts, and the
//! associated error types.

use serde_json::{Map, Value};
use thiserror::Error;

/// A stored record: a flat-or-nested JSON object
pub type Document = Map<String, Value>;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Invalid document in '{collection}': {message}")]
    InvalidDocument { collection: String, message: String },

    #[error("Background storage task failed: {0}")]
    Task(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Conjunction of field equality conditions
///
/// An empty filter matches every document in a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches documents whose top-level `field` equals `value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    /// Adds another equality condition
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluates the filter against an in-memory document
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| document.get(field).unwrap_or(&Value::Null) == value)
    }
}

/// Trait for document store backends
///
/// Collections are created implicitly on first write. Implementations must be
/// safe to share between concurrently running pipelines.
pub trait DocumentStore: Send + Sync {
    /// Appends documents to a collection as one batch
    ///
    /// Zero documents is a no-op; one and many documents take the same path.
    fn store(&self, collection: &str, documents: &[Document]) -> StorageResult<()>;

    /// Returns matching documents in insertion order
    fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<Document>>;

    /// Replaces the first matching document, returning how many were replaced (0 or 1)
    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        document: Document,
    ) -> StorageResult<usize>;

    /// Lists every collection holding at least one document, sorted by name
    fn collections(&self) -> StorageResult<Vec<String>>;
}

/// Builds the name of a per-source collection, `<prefix>_<source_name>`
pub fn collection_name(prefix: &str, source_name: &str) -> String {
    format!("{}_{}", prefix, source_name)
}

/// Converts a serializable value into a document
pub fn to_document<T: serde::Serialize>(collection: &str, value: &T) -> StorageResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::InvalidDocument {
            collection: collection.to_string(),
            message: format!("expected an object, got {}", other),
        }),
    }
}
