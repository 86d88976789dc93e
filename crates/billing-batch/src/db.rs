//! Database pool and schema setup
//!
//! One SQLite database holds both the ingested `billing_data` rows and the
//! job execution history. The schema lives in `migrations/` and is embedded
//! at compile time.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;

/// Default database URL (file-backed SQLite, created on first use).
pub const DEFAULT_DATABASE_URL: &str = "sqlite://billing.db";

/// URL of a private in-memory database.
pub const IN_MEMORY_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl DbConfig {
    /// Load from `BILLING_DATABASE_URL`, `BILLING_DB_MAX_CONNECTIONS` and
    /// `BILLING_DB_ACQUIRE_TIMEOUT`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            url: std::env::var("BILLING_DATABASE_URL").unwrap_or(defaults.url),
            max_connections: std::env::var("BILLING_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            acquire_timeout_secs: std::env::var("BILLING_DB_ACQUIRE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.acquire_timeout_secs),
        }
    }

    /// Configuration for a throwaway in-memory database
    pub fn in_memory() -> Self {
        Self {
            url: IN_MEMORY_DATABASE_URL.to_string(),
            max_connections: 1,
            ..Self::default()
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

pub async fn create_pool(config: &DbConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

    // Every in-memory connection is its own database, so the single
    // connection must never be recycled.
    if config.is_in_memory() {
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await?;

    tracing::info!(
        url = %config.url,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Apply the embedded migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::debug!("Database migrations applied");
    Ok(())
}

/// Create a pool and bring its schema up to date
pub async fn connect(config: &DbConfig) -> Result<SqlitePool> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 5);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_in_memory_schema() {
        let pool = connect(&DbConfig::in_memory()).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

        assert!(names.contains(&"billing_data"));
        assert!(names.contains(&"batch_job_execution"));
        assert!(names.contains(&"batch_step_execution"));
    }
}
