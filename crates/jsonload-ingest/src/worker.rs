//! Ingestion worker
//!
//! A worker owns one file at a time: claim, load, checkpoint, release.

use std::sync::Arc;
use std::time::Instant;

use crate::checkpoint::CheckpointStore;
use crate::claims::ClaimRegistry;
use crate::loader::RecordLoader;
use crate::types::{FileUnit, Outcome};

/// Processes single files; cheap to clone into spawned tasks
#[derive(Clone)]
pub struct IngestionWorker {
    loader: RecordLoader,
    checkpoints: Arc<dyn CheckpointStore>,
    claims: Arc<ClaimRegistry>,
}

impl IngestionWorker {
    pub fn new(
        loader: RecordLoader,
        checkpoints: Arc<dyn CheckpointStore>,
        claims: Arc<ClaimRegistry>,
    ) -> Self {
        Self {
            loader,
            checkpoints,
            claims,
        }
    }

    /// Run one file through its lifecycle
    ///
    /// Never fails: every error is folded into the returned [`Outcome`]. The
    /// claim is held until the checkpoint write has finished.
    pub async fn process(&self, unit: FileUnit) -> Outcome {
        let Some(_claim) = self.claims.claim(&unit.identifier) else {
            tracing::warn!(file = %unit.identifier, "File already in flight, skipping");
            return Outcome::contended(unit.identifier);
        };

        let started = Instant::now();
        tracing::debug!(file = %unit.identifier, path = %unit.path.display(), "Loading file");

        let summary = match self.loader.load(&unit).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(file = %unit.identifier, error = %e, "Failed to load file");
                return Outcome::failed(unit.identifier, e, started.elapsed());
            },
        };

        if let Err(e) = self.checkpoints.save(&unit.identifier).await {
            tracing::error!(
                file = %unit.identifier,
                records = summary.records,
                error = %e,
                "File loaded but checkpoint was not saved; it will be retried next run"
            );
            return Outcome::checkpoint_failed(unit.identifier, summary, e, started.elapsed());
        }

        let duration = started.elapsed();
        tracing::info!(
            file = %unit.identifier,
            records = summary.records,
            rows_written = summary.rows_written,
            duration_ms = duration.as_millis() as u64,
            "Loaded file"
        );

        Outcome::loaded(unit.identifier, summary, duration)
    }
}
