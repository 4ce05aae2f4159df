//! Ingestion run coordinator
//!
//! One run moves through fixed phases:
//! 1. Enumerate: list candidate files in the source directory
//! 2. Preflight: prove the target is reachable and the table exists
//! 3. Filter: drop files already in the checkpoint store
//! 4. Dispatch: hand the rest to a bounded pool of workers
//! 5. Collect and report: aggregate outcomes into a [`RunReport`]
//!
//! Structural problems abort the run with an [`IngestError`]. Problems with
//! individual files never do.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::checkpoint::CheckpointStore;
use crate::claims::ClaimRegistry;
use crate::config::IngestConfig;
use crate::discovery::discover_files;
use crate::error::{IngestError, LoadError};
use crate::loader::RecordLoader;
use crate::target::{connect_target, TargetStore};
use crate::types::{FileUnit, Outcome, RunReport};
use crate::worker::IngestionWorker;

/// Candidate files split into done and to-do
#[derive(Debug, Clone)]
pub struct WorkPlan {
    pub candidates: usize,
    pub skipped: usize,
    pub pending: Vec<FileUnit>,
}

/// List candidate files; an empty directory is a configuration error
pub async fn enumerate_candidates(
    source_dir: &Path,
    extension: &str,
) -> Result<Vec<FileUnit>, IngestError> {
    let candidates = discover_files(source_dir, extension).await?;
    if candidates.is_empty() {
        return Err(IngestError::NoCandidates {
            dir: source_dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    Ok(candidates)
}

/// Drop candidates already in the checkpoint store
pub async fn filter_checkpointed(
    candidates: Vec<FileUnit>,
    checkpoints: &dyn CheckpointStore,
) -> Result<WorkPlan, IngestError> {
    let done: HashSet<String> = checkpoints.load().await?;
    let total = candidates.len();
    let pending: Vec<FileUnit> = candidates
        .into_iter()
        .filter(|unit| !done.contains(&unit.identifier))
        .collect();

    Ok(WorkPlan {
        candidates: total,
        skipped: total - pending.len(),
        pending,
    })
}

/// Enumerate then filter, without touching the target
pub async fn plan_work(
    source_dir: &Path,
    extension: &str,
    checkpoints: &dyn CheckpointStore,
) -> Result<WorkPlan, IngestError> {
    let candidates = enumerate_candidates(source_dir, extension).await?;
    filter_checkpointed(candidates, checkpoints).await
}

/// Coordinates one loading run
pub struct IngestionCoordinator {
    source_dir: PathBuf,
    extension: String,
    workers: usize,
    dry_run: bool,
    target: Arc<dyn TargetStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    claims: Arc<ClaimRegistry>,
    loader: RecordLoader,
}

impl IngestionCoordinator {
    pub fn new(
        config: &IngestConfig,
        target: Arc<dyn TargetStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let loader =
            RecordLoader::new(Arc::clone(&target), config.table.clone(), config.conflict_policy);

        Self {
            source_dir: config.source_dir.clone(),
            extension: config.extension.clone(),
            workers: config.workers.max(1),
            dry_run: config.dry_run,
            target,
            checkpoints,
            claims: Arc::new(ClaimRegistry::new()),
            loader,
        }
    }

    /// Share a claim registry with other coordinators in this process
    pub fn with_claims(mut self, claims: Arc<ClaimRegistry>) -> Self {
        self.claims = claims;
        self
    }

    pub fn claims(&self) -> &Arc<ClaimRegistry> {
        &self.claims
    }

    /// Enumerate the source folder, then connect to the configured target
    /// and run. An empty folder is reported before the database is touched.
    pub async fn connect_and_run(
        config: &IngestConfig,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<RunReport, IngestError> {
        let started_at = Utc::now();
        let candidates = enumerate_candidates(&config.source_dir, &config.extension).await?;

        let target = connect_target(&config.database).await?;
        Self::new(config, target, checkpoints)
            .run_candidates(started_at, candidates)
            .await
    }

    /// Execute every phase and return the run's report
    pub async fn run(&self) -> Result<RunReport, IngestError> {
        let started_at = Utc::now();
        let candidates = enumerate_candidates(&self.source_dir, &self.extension).await?;
        self.run_candidates(started_at, candidates).await
    }

    async fn run_candidates(
        &self,
        started_at: DateTime<Utc>,
        candidates: Vec<FileUnit>,
    ) -> Result<RunReport, IngestError> {
        let timer = Instant::now();

        info!(
            source_dir = %self.source_dir.display(),
            extension = %self.extension,
            workers = self.workers,
            dry_run = self.dry_run,
            candidates = candidates.len(),
            "Starting ingestion run"
        );

        self.preflight().await?;

        let plan = filter_checkpointed(candidates, self.checkpoints.as_ref()).await?;
        info!(
            candidates = plan.candidates,
            skipped = plan.skipped,
            pending = plan.pending.len(),
            "Filtered already loaded files"
        );

        let pending: Vec<String> = plan.pending.iter().map(|u| u.identifier.clone()).collect();

        let outcomes = if self.dry_run {
            for identifier in &pending {
                info!(file = %identifier, "Would load file");
            }
            Vec::new()
        } else {
            self.run_units(plan.pending).await
        };

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            candidates: plan.candidates,
            skipped: plan.skipped,
            pending,
            outcomes,
            dry_run: self.dry_run,
        };

        info!(
            loaded = report.loaded(),
            failed = report.failed(),
            contended = report.contended(),
            checkpoint_failed = report.checkpoint_failed(),
            records = report.records(),
            rows_written = report.rows_written(),
            duration_ms = timer.elapsed().as_millis() as u64,
            "Ingestion run complete"
        );

        Ok(report)
    }

    /// Target must answer and hold the table before any work is dispatched
    async fn preflight(&self) -> Result<(), IngestError> {
        self.target.health_check().await?;

        if self.dry_run {
            return Ok(());
        }

        self.target.ensure_table(self.loader.schema()).await?;
        info!(table = self.loader.schema().name(), "Target table ready");

        Ok(())
    }

    /// Dispatch an explicit work list; outcomes arrive in completion order
    ///
    /// Each unit runs in its own task and at most `workers` run at once. A
    /// task that panics becomes a failed outcome for its file.
    pub async fn run_units(&self, units: Vec<FileUnit>) -> Vec<Outcome> {
        if units.is_empty() {
            info!("Nothing to load");
            return Vec::new();
        }

        info!(files = units.len(), workers = self.workers, "Dispatching files");

        let worker = IngestionWorker::new(
            self.loader.clone(),
            Arc::clone(&self.checkpoints),
            Arc::clone(&self.claims),
        );

        stream::iter(units)
            .map(|unit| {
                let worker = worker.clone();
                async move {
                    let identifier = unit.identifier.clone();
                    let started = Instant::now();

                    match tokio::spawn(async move { worker.process(unit).await }).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(file = %identifier, error = %e, "Worker task aborted");
                            Outcome::failed(
                                identifier,
                                LoadError::Task(e.to_string()),
                                started.elapsed(),
                            )
                        },
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await
    }
}
