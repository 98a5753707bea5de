//! Output module for inspecting crawl results
//!
//! This module handles:
//! - Loading per-source phase history, newest first
//! - Loading stored records and schedule entries
//! - Rendering all of the above as text tables or JSON

mod report;
mod views;

pub use report::{cycle_report_json, format_cycle_report, format_history, format_records, format_schedules};
pub use views::{load_all_history, load_history, load_records, SourceHistory};

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while rendering output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Renders any view as pretty-printed JSON
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> OutputResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
