//! Core types for a loading run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One source file; `identifier` is its file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileUnit {
    pub identifier: String,
    pub path: PathBuf,
}

impl FileUnit {
    pub fn new(identifier: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            path: path.into(),
        }
    }
}

/// Result of loading one file into the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Records decoded from the file
    pub records: usize,
    /// Rows actually inserted or updated; conflicts skipped under
    /// `ConflictPolicy::Skip` are not counted
    pub rows_written: u64,
}

/// Outcome status of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Loaded and checkpointed
    Loaded,
    /// Not loaded; nothing from this attempt was committed
    Failed,
    /// Another worker held the claim; nothing was attempted
    Contended,
    /// Loaded, but the checkpoint write failed; the file is retried next run
    CheckpointFailed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OutcomeStatus::Loaded => "loaded",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Contended => "contended",
            OutcomeStatus::CheckpointFailed => "checkpoint_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Loaded)
    }
}

/// Result of attempting one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub identifier: String,
    pub status: OutcomeStatus,
    pub records: usize,
    pub rows_written: u64,
    pub error: Option<String>,
    pub duration: Duration,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn loaded(identifier: impl Into<String>, summary: LoadSummary, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            status: OutcomeStatus::Loaded,
            records: summary.records,
            rows_written: summary.rows_written,
            error: None,
            duration,
        }
    }

    pub fn failed(identifier: impl Into<String>, error: impl ToString, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            status: OutcomeStatus::Failed,
            records: 0,
            rows_written: 0,
            error: Some(error.to_string()),
            duration,
        }
    }

    pub fn contended(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: OutcomeStatus::Contended,
            records: 0,
            rows_written: 0,
            error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn checkpoint_failed(
        identifier: impl Into<String>,
        summary: LoadSummary,
        error: impl ToString,
        duration: Duration,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            status: OutcomeStatus::CheckpointFailed,
            records: summary.records,
            rows_written: summary.rows_written,
            error: Some(error.to_string()),
            duration,
        }
    }
}

/// Aggregate of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Matching files found in the source directory
    pub candidates: usize,
    /// Candidates skipped because they were already checkpointed
    pub skipped: usize,
    /// Work list in dispatch order
    pub pending: Vec<String>,
    /// Outcomes in completion order; empty for a dry run
    pub outcomes: Vec<Outcome>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn loaded(&self) -> usize {
        self.count(OutcomeStatus::Loaded)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    pub fn contended(&self) -> usize {
        self.count(OutcomeStatus::Contended)
    }

    pub fn checkpoint_failed(&self) -> usize {
        self.count(OutcomeStatus::CheckpointFailed)
    }

    pub fn records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records).sum()
    }

    pub fn rows_written(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_written).sum()
    }

    pub fn outcome(&self, identifier: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.identifier == identifier)
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }

    /// True when every dispatched file was loaded and checkpointed
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(Outcome::is_success)
    }
}
