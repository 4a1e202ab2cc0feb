//! Display rows for the manual scan history.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::protocol::AnalysisEntry;
use crate::verdict::Classification;

/// Rows shown by default, matching the manual panel.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Placeholder for records without an address.
pub const UNKNOWN_URL: &str = "Unknown URL";

/// How the service produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    #[serde(rename = "AI")]
    Ai,
    Manual,
}

impl ScanMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::Manual => "Manual",
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One history line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub url: String,
    pub mode: ScanMode,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl HistoryRow {
    /// Scan time, when the service recorded one in ISO 8601 local time.
    #[must_use]
    pub fn scanned_at(&self) -> Option<NaiveDateTime> {
        self.timestamp.as_deref()?.parse().ok()
    }
}

impl From<&AnalysisEntry> for HistoryRow {
    fn from(entry: &AnalysisEntry) -> Self {
        Self {
            url: entry
                .url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| UNKNOWN_URL.to_string()),
            mode: if entry.used_ai {
                ScanMode::Ai
            } else {
                ScanMode::Manual
            },
            classification: entry.classification(),
            timestamp: entry.timestamp.clone(),
        }
    }
}

/// First `limit` entries as display rows, keeping service order (most recent
/// first).
#[must_use]
pub fn summarize(entries: &[AnalysisEntry], limit: usize) -> Vec<HistoryRow> {
    entries.iter().take(limit).map(HistoryRow::from).collect()
}
