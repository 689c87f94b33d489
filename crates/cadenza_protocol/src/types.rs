//! Command and event payload types.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Scan events
// ============================================================================

/// Phase of a library scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// Discovering candidate files on disk
    Reading,
    /// Probing discovered files and adding them to the library
    Indexing,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Reading => "reading",
            ScanPhase::Indexing => "indexing",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress notification for one file within a scan phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    /// 1-based position of `path` within the phase
    pub current: u64,
    pub total: u64,
    pub path: String,
}

impl ScanProgress {
    pub fn new(phase: ScanPhase, current: u64, total: u64, path: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            path: path.into(),
        }
    }

    /// Completed share of the phase in `0.0..=1.0`. An empty phase counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.current.min(self.total) as f64) / (self.total as f64)
        }
    }
}

/// An error attached to the input path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathedError<E> {
    pub path: String,
    pub error: E,
}

/// Envelope of the `library_scan` event stream.
///
/// `E` is the error representation: [`serde_json::Value`] on the receiving
/// side (the shape is not guaranteed), [`crate::HostError`] on the emitting side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LibraryScanEvent<E = serde_json::Value> {
    Ok(ScanProgress),
    Error(PathedError<E>),
}

impl<E> LibraryScanEvent<E> {
    pub fn progress(progress: ScanProgress) -> Self {
        Self::Ok(progress)
    }

    pub fn failure(path: impl Into<String>, error: E) -> Self {
        Self::Error(PathedError {
            path: path.into(),
            error,
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Arguments of the `create_library` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLibraryArgs {
    pub name: String,
    pub scan_locations: Vec<String>,
}

/// Success value of the `create_library` command.
///
/// Only `id` is mandatory on the wire; hosts that report less still produce
/// a usable outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryOutcome {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub track_count: u64,
    #[serde(default)]
    pub failed_count: u64,
}

/// Entry returned by the `get_libraries` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    pub id: u64,
    pub name: String,
    pub scan_locations: Vec<String>,
    pub track_count: u64,
}
