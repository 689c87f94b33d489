//! Scan session state.
//!
//! `Idle -> Running -> {Failed | CompletedClean | CompletedWithErrors}`.
//! Transitions only move forward and happen exactly once each. The session is
//! mutated solely by its orchestrator; everyone else sees clones.

use crate::error::TypedError;
use cadenza_protocol::{LibraryOutcome, ScanProgress};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanTerminal {
    Idle,
    Running,
    /// The command itself failed
    Failed,
    /// The command succeeded and no item failed
    CompletedClean,
    /// The command succeeded but some items failed; the library is usable
    CompletedWithErrors,
}

impl ScanTerminal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::CompletedClean => "completed-clean",
            Self::CompletedWithErrors => "completed-with-errors",
        }
    }

    /// True for the three completion states.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::CompletedClean | Self::CompletedWithErrors
        )
    }
}

impl fmt::Display for ScanTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One input that failed while the job as a whole carried on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub path: String,
    pub error: TypedError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Scan session is {state}; a session runs exactly once")]
    NotIdle { state: ScanTerminal },

    #[error("Scan session is {state}; it can only settle while running")]
    NotRunning { state: ScanTerminal },
}

/// Everything the interface knows about one scan job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSession {
    pub job_id: Uuid,
    pub terminal: ScanTerminal,
    /// Most recent progress only; intermediate values are not kept
    pub latest_progress: Option<ScanProgress>,
    /// Set iff `terminal == Failed`
    pub command_error: Option<TypedError>,
    /// Arrival order. Non-empty iff `terminal == CompletedWithErrors`,
    /// except that a failed job keeps whatever arrived before it failed.
    pub item_failures: Vec<ItemFailure>,
    pub outcome: Option<LibraryOutcome>,
    pub progress_events: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanSession {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            terminal: ScanTerminal::Idle,
            latest_progress: None,
            command_error: None,
            item_failures: Vec::new(),
            outcome: None,
            progress_events: 0,
            started_at: None,
            finished_at: None,
        }
    }

    pub(crate) fn begin(&mut self) -> Result<(), ScanError> {
        if self.terminal != ScanTerminal::Idle {
            return Err(ScanError::NotIdle {
                state: self.terminal,
            });
        }
        self.terminal = ScanTerminal::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Returns false when the event was ignored because the session is not running.
    pub(crate) fn record_progress(&mut self, progress: ScanProgress) -> bool {
        if self.terminal != ScanTerminal::Running {
            return false;
        }
        self.progress_events += 1;
        self.latest_progress = Some(progress);
        true
    }

    pub(crate) fn record_failure(&mut self, failure: ItemFailure) -> bool {
        if self.terminal != ScanTerminal::Running {
            return false;
        }
        self.item_failures.push(failure);
        true
    }

    /// Decide the completion state from the command result and everything
    /// accumulated so far. Called once, after the event stream is released.
    pub(crate) fn settle(
        &mut self,
        result: Result<LibraryOutcome, TypedError>,
    ) -> Result<ScanTerminal, ScanError> {
        if self.terminal != ScanTerminal::Running {
            return Err(ScanError::NotRunning {
                state: self.terminal,
            });
        }

        self.terminal = match result {
            Err(error) => {
                self.command_error = Some(error);
                ScanTerminal::Failed
            }
            Ok(outcome) => {
                self.outcome = Some(outcome);
                if self.item_failures.is_empty() {
                    ScanTerminal::CompletedClean
                } else {
                    ScanTerminal::CompletedWithErrors
                }
            }
        };
        self.finished_at = Some(Utc::now());
        Ok(self.terminal)
    }

    /// Wall-clock duration of the job, once it has finished.
    pub fn elapsed_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    /// View of the failure list capped at `limit` entries for display.
    pub fn failure_digest(&self, limit: usize) -> FailureDigest<'_> {
        let shown = &self.item_failures[..self.item_failures.len().min(limit)];
        FailureDigest {
            shown,
            hidden: self.item_failures.len() - shown.len(),
        }
    }
}

/// Display-side cap on the failure list. The session itself keeps every entry.
#[derive(Debug, Clone, Copy)]
pub struct FailureDigest<'a> {
    pub shown: &'a [ItemFailure],
    pub hidden: usize,
}

impl fmt::Display for FailureDigest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in self.shown {
            writeln!(f, "{}: {}", failure.path, failure.error.message)?;
        }
        if self.hidden > 0 {
            writeln!(f, "+{} more", self.hidden)?;
        }
        Ok(())
    }
}
