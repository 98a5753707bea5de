//! Phase telemetry
//!
//! Every pipeline phase appends one immutable `PhaseRecord` to the source's
//! telemetry collection. The newest `data-saved` record is the only signal the
//! scheduler uses to decide whether a source is due again.

use crate::state::Phase;
use crate::storage::traits::{collection_name, to_document, DocumentStore, Filter, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One completed phase of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub duration_ms: u64,
}

/// Append-only access to per-source phase trails
#[derive(Clone)]
pub struct TelemetryLog {
    store: Arc<dyn DocumentStore>,
    prefix: String,
}

impl TelemetryLog {
    pub fn new(store: Arc<dyn DocumentStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn collection(&self, source_name: &str) -> String {
        collection_name(&self.prefix, source_name)
    }

    /// Appends the record for a phase that just finished
    pub fn record(
        &self,
        source_name: &str,
        phase: Phase,
        elapsed: Duration,
    ) -> StorageResult<PhaseRecord> {
        let record = PhaseRecord {
            source_name: source_name.to_string(),
            timestamp: Utc::now(),
            phase,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };

        let collection = self.collection(source_name);
        let document = to_document(&collection, &record)?;
        self.store.store(&collection, &[document])?;
        Ok(record)
    }

    /// Full trail of a source, newest first
    pub fn history(&self, source_name: &str) -> StorageResult<Vec<PhaseRecord>> {
        let mut records = self.load(source_name, &Filter::all())?;
        records.reverse();
        Ok(records)
    }

    /// Timestamp of the source's most recent completed run
    pub fn last_completion(&self, source_name: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let filter = Filter::eq("phase", Phase::TERMINAL.to_db_string());
        let completions = self.load(source_name, &filter)?;
        Ok(completions.last().map(|record| record.timestamp))
    }

    /// Names of all sources that have written telemetry, sorted
    pub fn sources(&self) -> StorageResult<Vec<String>> {
        let marker = format!("{}_", self.prefix);
        Ok(self
            .store
            .collections()?
            .into_iter()
            .filter_map(|name| name.strip_prefix(&marker).map(str::to_string))
            .collect())
    }

    fn load(&self, source_name: &str, filter: &Filter) -> StorageResult<Vec<PhaseRecord>> {
        self.store
            .find(&self.collection(source_name), filter)?
            .into_iter()
            .map(|document| {
                serde_json::from_value(serde_json::Value::Object(document))
                    .map_err(StorageError::Serialization)
            })
            .collect()
    }
}
