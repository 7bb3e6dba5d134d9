//! # Store Connection Pool
//!
//! SQLite connection pooling for the cover blob store.
//!
//! - **WAL Mode**: multiple readers, one writer; `get`/`put`/`trim` serialize
//!   through the engine rather than an application-level mutex
//! - **Lazy creation**: the database file is created on first open
//! - **Automatic migrations**: the `covers` schema is applied on open
//!
//! The store file lives under an application-private cache root; open it once
//! and share the pool for the process lifetime.

use crate::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the cover store database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file path or `:memory:` for an in-memory store
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    /// Configuration for an on-disk store at the given path.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Configuration for an in-memory store (useful for testing).
    ///
    /// Pinned to a single connection: every pooled connection would otherwise
    /// open its own private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a configured SQLite connection pool with the cover schema applied.
///
/// # Errors
///
/// Returns an error if the database file cannot be accessed, pool creation
/// fails, or migrations fail.
pub async fn create_pool(config: StoreConfig) -> Result<Pool<Sqlite>> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Opening cover store"
    );

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(StoreError::Database)?
        // WAL mode for concurrent readers
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        // Create the store lazily on first open
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open cover store");
            StoreError::Database(e)
        })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    Ok(pool)
}

/// Create an in-memory pool with the schema applied, for tests.
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(StoreConfig::in_memory()).await
}

/// Apply the embedded schema migrations.
async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Cover store migration failed");
        StoreError::Migration(e.to_string())
    })?;

    debug!("Cover store migrations applied");
    Ok(())
}

/// Verify the pool is usable.
async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Cover store health check failed");
        StoreError::Database(e)
    })?;

    Ok(())
}
