//! Durable record of files already loaded
//!
//! The checkpoint set only grows. An identifier is written after its file
//! committed, never removed, and absence means "never confirmed".

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::CheckpointError;

/// Default checkpoint database file
pub const DEFAULT_CHECKPOINT_PATH: &str = "checkpoint.db";

const BUSY_TIMEOUT_SECS: u64 = 10;
const MAX_CONNECTIONS: u32 = 4;

/// Set of file identifiers confirmed as loaded in any past run
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<HashSet<String>, CheckpointError>;

    /// Saving an identifier twice is a no-op
    async fn save(&self, identifier: &str) -> Result<(), CheckpointError>;

    async fn contains(&self, identifier: &str) -> Result<bool, CheckpointError>;

    async fn len(&self) -> Result<usize, CheckpointError>;

    async fn is_empty(&self) -> Result<bool, CheckpointError> {
        Ok(self.len().await? == 0)
    }
}

/// Checkpoint store in a local SQLite file
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open the store, creating the file and table if absent
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                file TEXT PRIMARY KEY,
                loaded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!(path = %path.display(), "Checkpoint store opened");

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self) -> Result<HashSet<String>, CheckpointError> {
        let files: Vec<String> = sqlx::query_scalar("SELECT file FROM checkpoints")
            .fetch_all(&self.pool)
            .await?;

        Ok(files.into_iter().collect())
    }

    async fn save(&self, identifier: &str) -> Result<(), CheckpointError> {
        sqlx::query("INSERT INTO checkpoints (file) VALUES (?1) ON CONFLICT(file) DO NOTHING")
            .bind(identifier)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn contains(&self, identifier: &str) -> Result<bool, CheckpointError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM checkpoints WHERE file = ?1")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    async fn len(&self) -> Result<usize, CheckpointError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkpoints")
            .fetch_one(&self.pool)
            .await?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fresh_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SqliteCheckpointStore::open(dir.path().join("checkpoint.db"))
            .await
            .unwrap();

        assert!(store.load().await.unwrap().is_empty());
        assert!(store.is_empty().await.unwrap());
        assert!(!store.contains("a.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SqliteCheckpointStore::open(dir.path().join("checkpoint.db"))
            .await
            .unwrap();

        store.save("a.json").await.unwrap();
        store.save("a.json").await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.contains("a.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("checkpoint.db");

        let store = SqliteCheckpointStore::open(&path).await.unwrap();
        store.save("a.json").await.unwrap();
        store.save("b.json").await.unwrap();
        store.close().await;

        let reopened = SqliteCheckpointStore::open(&path).await.unwrap();
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("a.json"));
        assert!(loaded.contains("b.json"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteCheckpointStore::open(dir.path().join("checkpoint.db"))
                .await
                .unwrap(),
        );

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.save(&format!("file_{}.json", i % 8)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 8);
    }
}
