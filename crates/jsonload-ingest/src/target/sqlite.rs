//! Embedded SQLite target
//!
//! JSON columns are stored as TEXT. In-memory URLs are pinned to a single
//! long-lived connection; the database disappears with its last connection.

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::types::Json;
use sqlx::Sqlite;
use std::str::FromStr;
use std::time::Duration;

use super::{DatabaseConfig, DbResult, TargetStore};
use crate::error::LoadError;
use crate::record::{Record, SqlParam};
use crate::schema::{ConflictPolicy, Dialect, TableSchema};

pub struct SqliteTarget {
    pool: SqlitePool,
}

impl SqliteTarget {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.connect_timeout_secs));

        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections.min(config.max_connections))
        };

        let pool = pool_options.connect_with(options).await?;

        tracing::info!(in_memory, "SQLite target opened");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind_param<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    param: SqlParam,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        SqlParam::BigInt(v) => query.bind(v),
        SqlParam::Double(v) => query.bind(v),
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Boolean(v) => query.bind(v),
        SqlParam::Json(v) => query.bind(v.map(Json)),
    }
}

#[async_trait]
impl TargetStore for SqliteTarget {
    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_table(&self, schema: &TableSchema) -> DbResult<()> {
        let sql = schema.create_table_sql(Dialect::Sqlite);
        sqlx::query(&sql).execute(&self.pool).await?;

        tracing::debug!(table = schema.name(), "Target table ready");
        Ok(())
    }

    async fn upsert_records(
        &self,
        schema: &TableSchema,
        records: &[Record],
        policy: ConflictPolicy,
    ) -> Result<u64, LoadError> {
        let mut tx = self.pool.begin().await?;
        let mut rows_written = 0;

        for record in records {
            let (columns, params) = record.to_params(schema)?;
            let sql = schema.upsert_sql(&columns, policy, Dialect::Sqlite);
            let query = params.into_iter().fold(sqlx::query(&sql), bind_param);
            rows_written += query.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(rows_written)
    }

    async fn count_rows(&self, schema: &TableSchema) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", schema.name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
