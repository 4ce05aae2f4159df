//! Common test utilities for jsonload integration tests
//!
//! [`Fixture`] gives each test a private temp directory holding the source
//! folder, a file-backed SQLite target and a checkpoint store.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use jsonload_ingest::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use jsonload_ingest::config::IngestConfig;
use jsonload_ingest::coordinator::IngestionCoordinator;
use jsonload_ingest::error::CheckpointError;
use jsonload_ingest::target::{DatabaseConfig, SqliteTarget, TargetStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,jsonload_ingest=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Isolated source folder, target database and checkpoint store
pub struct Fixture {
    pub dir: TempDir,
    pub config: IngestConfig,
    pub target: Arc<SqliteTarget>,
    pub checkpoints: Arc<SqliteCheckpointStore>,
}

impl Fixture {
    pub async fn new() -> Result<Self> {
        init_test_tracing();

        let dir = TempDir::new()?;
        let source_dir = dir.path().join("input");
        std::fs::create_dir_all(&source_dir)?;

        let target_path = dir.path().join("target.db");
        let database = DatabaseConfig::with_url(format!("sqlite://{}", target_path.display()));
        let target = Arc::new(SqliteTarget::connect(&database).await?);

        let checkpoint_path = dir.path().join("checkpoint.db");
        let checkpoints = Arc::new(SqliteCheckpointStore::open(&checkpoint_path).await?);

        let config = IngestConfig {
            source_dir,
            checkpoint_path,
            database,
            ..IngestConfig::default()
        };

        Ok(Self {
            dir,
            config,
            target,
            checkpoints,
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        self.config.source_dir.clone()
    }

    /// Write a source file and return its path
    pub fn write_file(&self, name: &str, body: &str) -> PathBuf {
        let path = self.config.source_dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    pub fn coordinator(&self) -> IngestionCoordinator {
        self.coordinator_with(self.checkpoints.clone())
    }

    pub fn coordinator_with(&self, checkpoints: Arc<dyn CheckpointStore>) -> IngestionCoordinator {
        let target: Arc<dyn TargetStore> = self.target.clone();
        IngestionCoordinator::new(&self.config, target, checkpoints)
    }

    pub async fn row_count(&self) -> i64 {
        self.target.count_rows(&self.config.table).await.unwrap()
    }

    pub async fn checkpointed(&self) -> HashSet<String> {
        self.checkpoints.load().await.unwrap()
    }

    pub async fn table_exists(&self) -> bool {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
        )
        .bind(self.config.table.name())
        .fetch_optional(self.target.pool())
        .await
        .unwrap();
        found.is_some()
    }
}

/// `n` product records with ids `first..first + n`
pub fn products(first: i64, n: usize) -> String {
    let items: Vec<serde_json::Value> = (0..n as i64)
        .map(|i| {
            serde_json::json!({
                "id": first + i,
                "name": format!("product {}", first + i),
                "price": 1000 + i,
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// In-memory checkpoint store whose writes can be switched off
#[derive(Default)]
pub struct FlakyCheckpoints {
    saved: Mutex<HashSet<String>>,
    fail_saves: AtomicBool,
}

impl FlakyCheckpoints {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_saves.store(true, Ordering::SeqCst);
        store
    }

    pub fn heal(&self) {
        self.fail_saves.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckpointStore for FlakyCheckpoints {
    async fn load(&self) -> Result<HashSet<String>, CheckpointError> {
        Ok(self.saved.lock().clone())
    }

    async fn save(&self, identifier: &str) -> Result<(), CheckpointError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::Io(std::io::Error::other("disk full")));
        }
        self.saved.lock().insert(identifier.to_string());
        Ok(())
    }

    async fn contains(&self, identifier: &str) -> Result<bool, CheckpointError> {
        Ok(self.saved.lock().contains(identifier))
    }

    async fn len(&self) -> Result<usize, CheckpointError> {
        Ok(self.saved.lock().len())
    }
}
