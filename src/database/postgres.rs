use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Row as _};
use std::time::Instant;

use crate::config::DatabaseConfig;
use crate::filter::{Condition, Filter, SqlResult};
use super::manager::DatabaseManager;
use super::storage::{Row, Storage, StorageError};

/// Postgres-backed storage
pub struct PgStorage {
    pool: PgPool,
    enable_query_logging: bool,
    slow_query_threshold_ms: Option<u64>,
}

impl PgStorage {
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            enable_query_logging: config.enable_query_logging,
            slow_query_threshold_ms: config.enable_slow_query_warning.then_some(config.slow_query_threshold_ms),
        }
    }

    async fn fetch_rows(&self, sql: SqlResult) -> Result<Vec<Row>, StorageError> {
        if self.enable_query_logging {
            tracing::debug!(query = %sql.query, params = sql.params.len(), "executing query");
        }

        let started = Instant::now();
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        self.warn_if_slow(&sql.query, started);

        rows.iter()
            .map(|row| {
                let value: Value = row.try_get("row")?;
                match value {
                    Value::Object(map) => Ok(map),
                    other => Err(StorageError::QueryError(format!("unexpected row format: {}", other))),
                }
            })
            .collect()
    }

    fn warn_if_slow(&self, query: &str, started: Instant) {
        if let Some(threshold) = self.slow_query_threshold_ms {
            let elapsed = started.elapsed().as_millis() as u64;
            if elapsed > threshold {
                tracing::warn!(elapsed_ms = elapsed, threshold_ms = threshold, "slow query: {}", query);
            }
        }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn select(&self, table: &str, columns: &[&str], conditions: &[Condition]) -> Result<Vec<Row>, StorageError> {
        let mut filter = Filter::new(table)?;
        filter.select(columns)?.where_conditions(conditions)?;
        self.fetch_rows(filter.to_sql()?).await
    }

    async fn insert(&self, table: &str, values: Row) -> Result<Row, StorageError> {
        let sql = Filter::new(table)?.to_insert_sql(&values)?;
        self.fetch_rows(sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::QueryError(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, id: i64, values: Row) -> Result<Option<Row>, StorageError> {
        let sql = Filter::new(table)?.to_update_sql(id, &values, true)?;
        Ok(self.fetch_rows(sql).await?.into_iter().next())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Integer lists bind as int8[] for `= ANY($n)`; anything else travels as JSONB
        Value::Array(items) => match items.iter().map(Value::as_i64).collect::<Option<Vec<i64>>>() {
            Some(ids) => q.bind(ids),
            None => q.bind(v.clone()),
        },
        Value::Object(_) => q.bind(v.clone()),
    }
}
