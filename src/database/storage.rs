use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{Condition, FilterError};

/// A storage row as a column → value mapping
pub type Row = Map<String, Value>;

/// Errors from the storage layer. Everything here is an infrastructure fault
/// except `Conflict`, which callers may recover into a soft error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505 = unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return StorageError::Conflict(db_err.message().to_string());
            }
        }
        StorageError::Sqlx(err)
    }
}

/// Storage engine contract consumed by the entity models
#[async_trait]
pub trait Storage: Send + Sync {
    /// Filtered, column-projected read. An empty `columns` slice selects
    /// every column. Rows come back ordered by `id`.
    async fn select(&self, table: &str, columns: &[&str], conditions: &[Condition]) -> Result<Vec<Row>, StorageError>;

    /// Insert and return the canonical stored row (generated id, timestamps)
    async fn insert(&self, table: &str, values: Row) -> Result<Row, StorageError>;

    /// Update by id and return the canonical row, or `None` if no row has that id
    async fn update(&self, table: &str, id: i64, values: Row) -> Result<Option<Row>, StorageError>;

    /// Connectivity check used by `/health`
    async fn ping(&self) -> Result<(), StorageError>;
}
