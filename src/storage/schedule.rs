//! Schedule store
//!
//! Interval configuration per source, kept in one shared collection and keyed
//! by `source_name` like a unique index: `create` never overwrites and
//! `update` never inserts.

use crate::storage::traits::{to_document, DocumentStore, Filter, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors raised by schedule administration
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("A schedule for '{0}' already exists")]
    AlreadyExists(String),

    #[error("No schedule exists for '{0}'")]
    NotFound(String),

    #[error("Invalid schedule: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How long to wait after a completed run before the next one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default)]
    pub days: u64,
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
}

impl Interval {
    pub fn new(days: u64, hours: u64, minutes: u64, seconds: u64) -> Self {
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    /// `((days*24 + hours)*60 + minutes)*60 + seconds`, or None on overflow
    pub fn checked_total_seconds(&self) -> Option<i64> {
        let total = self
            .days
            .checked_mul(24)?
            .checked_add(self.hours)?
            .checked_mul(60)?
            .checked_add(self.minutes)?
            .checked_mul(60)?
            .checked_add(self.seconds)?;
        i64::try_from(total).ok()
    }

    /// Total length in seconds, saturating at `i64::MAX`
    pub fn total_seconds(&self) -> i64 {
        self.checked_total_seconds().unwrap_or(i64::MAX)
    }
}

/// Persisted interval configuration for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub source_name: String,
    #[serde(flatten)]
    pub interval: Interval,
}

impl ScheduleEntry {
    pub fn new(source_name: impl Into<String>, interval: Interval) -> Self {
        Self {
            source_name: source_name.into(),
            interval,
        }
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        if !crate::config::is_identifier(&self.source_name) {
            return Err(ScheduleError::Invalid(format!(
                "source name must be a non-empty identifier of [A-Za-z0-9_-], got '{}'",
                self.source_name
            )));
        }
        if self.interval.checked_total_seconds().is_none() {
            return Err(ScheduleError::Invalid(format!(
                "interval for '{}' is too large",
                self.source_name
            )));
        }
        Ok(())
    }
}

/// Create/read/update access to schedule entries
#[derive(Clone)]
pub struct ScheduleStore {
    store: Arc<dyn DocumentStore>,
    collection: String,
    write_lock: Arc<Mutex<()>>,
}

impl ScheduleStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn key(source_name: &str) -> Filter {
        Filter::eq("source_name", source_name)
    }

    /// Gets the entry for a source, if one exists
    pub fn get(&self, source_name: &str) -> Result<Option<ScheduleEntry>, ScheduleError> {
        let documents = self.store.find(&self.collection, &Self::key(source_name))?;
        match documents.into_iter().next() {
            Some(document) => Ok(Some(decode(document)?)),
            None => Ok(None),
        }
    }

    /// Lists all entries in insertion order
    pub fn list(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        self.store
            .find(&self.collection, &Filter::all())?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Inserts a new entry; fails if the source already has one
    pub fn create(&self, entry: &ScheduleEntry) -> Result<(), ScheduleError> {
        entry.validate()?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;

        if self.get(&entry.source_name)?.is_some() {
            return Err(ScheduleError::AlreadyExists(entry.source_name.clone()));
        }

        let document = to_document(&self.collection, entry)?;
        self.store.store(&self.collection, &[document])?;
        tracing::info!(source = %entry.source_name, "Created schedule");
        Ok(())
    }

    /// Replaces an existing entry; fails if the source has none
    pub fn update(&self, entry: &ScheduleEntry) -> Result<(), ScheduleError> {
        entry.validate()?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;

        let document = to_document(&self.collection, entry)?;
        let replaced =
            self.store
                .replace_one(&self.collection, &Self::key(&entry.source_name), document)?;
        if replaced == 0 {
            return Err(ScheduleError::NotFound(entry.source_name.clone()));
        }

        tracing::info!(source = %entry.source_name, "Updated schedule");
        Ok(())
    }

    /// Creates the entry unless one already exists; returns whether it was created
    pub fn ensure(&self, entry: &ScheduleEntry) -> Result<bool, ScheduleError> {
        match self.create(entry) {
            Ok(()) => Ok(true),
            Err(ScheduleError::AlreadyExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn decode(document: crate::storage::Document) -> Result<ScheduleEntry, ScheduleError> {
    serde_json::from_value(serde_json::Value::Object(document))
        .map_err(|e| ScheduleError::Storage(StorageError::Serialization(e)))
}
