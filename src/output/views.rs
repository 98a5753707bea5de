//! Read-side views over the document store

use crate::storage::{
    collection_name, Document, DocumentStore, Filter, PhaseRecord, StorageResult, TelemetryLog,
};
use serde::Serialize;

/// Phase trail of one source
#[derive(Debug, Clone, Serialize)]
pub struct SourceHistory {
    pub source_name: String,
    /// Newest first
    pub records: Vec<PhaseRecord>,
}

pub fn load_history(telemetry: &TelemetryLog, source_name: &str) -> StorageResult<SourceHistory> {
    Ok(SourceHistory {
        source_name: source_name.to_string(),
        records: telemetry.history(source_name)?,
    })
}

/// History of every source that has written telemetry, sorted by source name
pub fn load_all_history(telemetry: &TelemetryLog) -> StorageResult<Vec<SourceHistory>> {
    telemetry
        .sources()?
        .iter()
        .map(|source_name| load_history(telemetry, source_name))
        .collect()
}

/// Stored records of a source, newest first
pub fn load_records(
    store: &dyn DocumentStore,
    data_prefix: &str,
    source_name: &str,
) -> StorageResult<Vec<Document>> {
    let mut records = store.find(&collection_name(data_prefix, source_name), &Filter::all())?;
    records.reverse();
    Ok(records)
}
