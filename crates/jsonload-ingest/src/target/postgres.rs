//! Postgres target (production)

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::Postgres;
use std::time::Duration;

use super::{DatabaseConfig, DbResult, TargetStore};
use crate::error::LoadError;
use crate::record::{Record, SqlParam};
use crate::schema::{ConflictPolicy, Dialect, TableSchema};

pub struct PostgresTarget {
    pool: PgPool,
}

impl PostgresTarget {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Postgres connection pool created"
        );

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: SqlParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::BigInt(v) => query.bind(v),
        SqlParam::Double(v) => query.bind(v),
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Boolean(v) => query.bind(v),
        SqlParam::Json(v) => query.bind(v.map(Json)),
    }
}

#[async_trait]
impl TargetStore for PostgresTarget {
    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_table(&self, schema: &TableSchema) -> DbResult<()> {
        let sql = schema.create_table_sql(Dialect::Postgres);
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
            let sql = schema.upsert_sql(&columns, policy, Dialect::Postgres);
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
