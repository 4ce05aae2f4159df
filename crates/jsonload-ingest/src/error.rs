//! Error types for the loader
//!
//! Two classes matter to callers:
//!
//! - [`IngestError`] is structural. It aborts the run before (or instead of)
//!   dispatching work and maps to a non-zero exit status.
//! - [`LoadError`] belongs to a single file. Workers turn it into a failed
//!   [`Outcome`](crate::types::Outcome) and the run carries on.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::{ColumnKind, SchemaError};
use crate::target::DbError;

/// Fatal, run-level errors
#[derive(Error, Debug)]
pub enum IngestError {
    /// Source directory holds no matching files; treated as misconfiguration
    #[error("No '.{extension}' files found in '{}'. Check the source directory setting.", dir.display())]
    NoCandidates { dir: PathBuf, extension: String },

    /// Source directory missing or unreadable
    #[error("Cannot read source directory '{}': {source}", dir.display())]
    SourceDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target database unreachable or table creation failed
    #[error("Target database unavailable: {0}")]
    TargetUnavailable(#[from] DbError),

    /// Checkpoint store could not be opened or read
    #[error("Checkpoint store unusable: {0}")]
    CheckpointStore(#[from] CheckpointError),

    /// Invalid table definition
    #[error("Invalid table schema: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check the config file, environment variables and flags.")]
    Config(String),
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Per-file load errors; none of these stop other files
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Expected a top-level JSON array, found {0}")]
    NotAnArray(&'static str),

    #[error("Record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("Record {index} has no '{column}' value")]
    MissingId { index: usize, column: String },

    #[error("Record {index} has field '{field}' with no matching column")]
    UnknownColumn { index: usize, field: String },

    #[error("Record {index} field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        index: usize,
        field: String,
        expected: ColumnKind,
        found: &'static str,
    },

    #[error("Database write failed: {0}")]
    Database(#[from] sqlx::Error),

    /// The worker task itself died (panic or runtime shutdown)
    #[error("Worker task aborted: {0}")]
    Task(String),
}

/// Checkpoint store errors
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Checkpoint path error: {0}")]
    Io(#[from] std::io::Error),
}
