use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Errors from DatabaseManager and the repositories built on it
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection pool construction and schema migration
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a pool for `url`. In-memory databases are pinned to a single
    /// connection; every extra connection would open a separate empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, DatabaseError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl(url.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let memory = Self::is_memory_url(url);
        let max_connections = if memory { 1 } else { max_connections.max(1) };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if memory {
            // Closing the only connection would drop the database
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;

        info!("Opened database pool for {} ({} connections)", url, max_connections);
        Ok(pool)
    }

    /// Open a pool and bring the schema up to date
    pub async fn connect_and_migrate(url: &str, max_connections: u32) -> Result<SqlitePool, DatabaseError> {
        let pool = Self::connect(url, max_connections).await?;
        Self::migrate(&pool).await?;
        Ok(pool)
    }

    pub async fn migrate(pool: &SqlitePool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &SqlitePool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    fn is_memory_url(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }
}
