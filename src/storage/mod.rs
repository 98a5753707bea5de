//! Storage module for persisting crawl data
//!
//! This module handles all persistence for the crawler, including:
//! - The narrow document-store port every other module writes through
//! - A SQLite-backed document store
//! - Schedule entries (one per source, unique by name)
//! - Per-source phase telemetry, the trail the scheduler reads back

mod schedule;
mod schema;
mod sqlite;
mod telemetry;
mod traits;

pub use schedule::{Interval, ScheduleEntry, ScheduleError, ScheduleStore};
pub use sqlite::SqliteDocumentStore;
pub use telemetry::{PhaseRecord, TelemetryLog};
pub use traits::{
    collection_name, to_document, Document, DocumentStore, Filter, StorageError, StorageResult,
};

use std::path::Path;

/// Opens or creates the document store at the given path
pub fn open_storage(path: &Path) -> StorageResult<SqliteDocumentStore> {
    SqliteDocumentStore::new(path)
}

/// Runs a synchronous store call on tokio's blocking pool
///
/// Every storage call made from async code goes through here, so pipelines
/// never hold a worker thread while waiting on the SQLite lock.
pub async fn run_blocking<T, F>(call: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}
