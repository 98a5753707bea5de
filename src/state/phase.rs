//! Pipeline phase definitions
//!
//! A crawl run enters each phase exactly once, in the order
//! links-created, links-downloaded, data-parsed, data-saved.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A completed stage of a crawl run, as recorded in the telemetry trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Fetch targets were enumerated by the adapter
    LinksCreated,

    /// Every target resolved to a payload or a soft-empty result
    LinksDownloaded,

    /// Payloads were turned into normalized records
    DataParsed,

    /// Records were written to the source's data collection
    DataSaved,
}

impl Phase {
    /// Phases in run order
    pub const ALL: [Phase; 4] = [
        Phase::LinksCreated,
        Phase::LinksDownloaded,
        Phase::DataParsed,
        Phase::DataSaved,
    ];

    /// The phase whose record marks a completed run
    pub const TERMINAL: Phase = Phase::DataSaved;

    /// Converts the phase to its stored string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::LinksCreated => "links-created",
            Self::LinksDownloaded => "links-downloaded",
            Self::DataParsed => "data-parsed",
            Self::DataSaved => "data-saved",
        }
    }

}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
