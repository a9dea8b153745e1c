use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use super::storage::StorageError;

const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Builds and tears down the Postgres connection pool
pub struct DatabaseManager;

impl DatabaseManager {
    /// Connect using `database.url` and the pool settings from config
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StorageError> {
        let connection_string = Self::connection_string(config)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&connection_string)
            .await?;

        info!("Created database pool for: {}", Self::redact(&connection_string));

        if config.run_migrations {
            Self::migrate(&pool).await?;
        }
        Ok(pool)
    }

    /// Create tables if they do not exist yet
    pub async fn migrate(pool: &PgPool) -> Result<(), StorageError> {
        pool.execute(SCHEMA_SQL).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    pub async fn close(pool: &PgPool) {
        pool.close().await;
        info!("Closed database pool");
    }

    fn connection_string(config: &DatabaseConfig) -> Result<String, StorageError> {
        let raw = config.url.as_deref().ok_or(StorageError::ConfigMissing("DATABASE_URL"))?;
        let url = url::Url::parse(raw).map_err(|_| StorageError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(StorageError::InvalidDatabaseUrl);
        }
        Ok(url.into())
    }

    /// Strip credentials before a URL goes anywhere near a log line
    fn redact(connection_string: &str) -> String {
        match url::Url::parse(connection_string) {
            Ok(mut url) => {
                let _ = url.set_password(None);
                let _ = url.set_username("");
                url.into()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }
}
