//! Loads one source file into the target table

use std::sync::Arc;

use crate::error::LoadError;
use crate::record::decode_records;
use crate::schema::{ConflictPolicy, TableSchema};
use crate::target::TargetStore;
use crate::types::{FileUnit, LoadSummary};

/// Reads, decodes and upserts a file as one all-or-nothing unit
///
/// The loader never touches the checkpoint store; that is the worker's job.
#[derive(Clone)]
pub struct RecordLoader {
    target: Arc<dyn TargetStore>,
    schema: Arc<TableSchema>,
    policy: ConflictPolicy,
}

impl RecordLoader {
    pub fn new(target: Arc<dyn TargetStore>, schema: TableSchema, policy: ConflictPolicy) -> Self {
        Self {
            target,
            schema: Arc::new(schema),
            policy,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub async fn load(&self, unit: &FileUnit) -> Result<LoadSummary, LoadError> {
        let bytes = tokio::fs::read(&unit.path)
            .await
            .map_err(|source| LoadError::Io {
                path: unit.path.clone(),
                source,
            })?;

        let records = decode_records(&bytes)?;
        if records.is_empty() {
            tracing::debug!(file = %unit.identifier, "File holds no records");
            return Ok(LoadSummary::default());
        }

        let rows_written = self
            .target
            .upsert_records(&self.schema, &records, self.policy)
            .await?;

        Ok(LoadSummary {
            records: records.len(),
            rows_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{DatabaseConfig, SqliteTarget};
    use tempfile::TempDir;

    async fn loader() -> (RecordLoader, Arc<SqliteTarget>) {
        let target = Arc::new(
            SqliteTarget::connect(&DatabaseConfig::with_url("sqlite::memory:"))
                .await
                .unwrap(),
        );
        let schema = TableSchema::products("d_products").unwrap();
        target.ensure_table(&schema).await.unwrap();

        let store: Arc<dyn TargetStore> = target.clone();
        (RecordLoader::new(store, schema, ConflictPolicy::Skip), target)
    }

    fn unit(dir: &TempDir, name: &str, body: &str) -> FileUnit {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        FileUnit::new(name, path)
    }

    #[tokio::test]
    async fn test_load_counts_records_and_rows() {
        let dir = TempDir::new().unwrap();
        let (loader, target) = loader().await;

        let file = unit(&dir, "a.json", r#"[{"id": 1}, {"id": 2}, {"id": 1}]"#);
        let summary = loader.load(&file).await.unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(target.count_rows(loader.schema()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_array_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let (loader, _) = loader().await;

        let summary = loader.load(&unit(&dir, "e.json", "[]")).await.unwrap();
        assert_eq!(summary, LoadSummary::default());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let (loader, _) = loader().await;

        let missing = FileUnit::new("gone.json", dir.path().join("gone.json"));
        assert!(matches!(loader.load(&missing).await, Err(LoadError::Io { .. })));
    }

    #[tokio::test]
    async fn test_malformed_file_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (loader, target) = loader().await;

        let file = unit(&dir, "bad.json", r#"[{"id": 1}, {"id": "#);
        assert!(matches!(loader.load(&file).await, Err(LoadError::Decode(_))));
        assert_eq!(target.count_rows(loader.schema()).await.unwrap(), 0);
    }
}
