//! Database connection management

use bookshelf_core::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database connection pool
pub type DbPool = Pool<Sqlite>;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the Calibre `metadata.db`
    pub path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Open without write access
    pub read_only: bool,
    /// Create database if it doesn't exist
    pub create_if_missing: bool,
    /// How long a query waits on a lock held by Calibre itself
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("metadata.db"),
            max_connections: 4,
            read_only: true,
            create_if_missing: false,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with a custom path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the maximum number of connections
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Opens the file writable, used to build fixtures
    pub fn writable(mut self) -> Self {
        self.read_only = false;
        self.create_if_missing = true;
        self
    }
}

/// Establishes a connection pool to the library database
pub async fn connect(config: DatabaseConfig) -> Result<DbPool, AppError> {
    if config.read_only && !config.path.exists() {
        return Err(AppError::SourceUnavailable {
            source_name: "library_db".to_string(),
            reason: format!("{} does not exist", config.path.display()),
        });
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .read_only(config.read_only)
        .create_if_missing(config.create_if_missing)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database("Failed to connect to library database", e))?;

    log::debug!(
        "Opened library database {} (read_only={})",
        config.path.display(),
        config.read_only
    );
    Ok(pool)
}

/// Creates an in-memory database for testing
#[cfg(test)]
pub async fn create_test_db() -> Result<DbPool, AppError> {
    use sqlx::sqlite::SqliteJournalMode;
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| AppError::database("Failed to create test database", e))?
        .journal_mode(SqliteJournalMode::Memory);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database("Failed to connect to test database", e))
}

/// Closes the database connection pool
pub async fn close(pool: DbPool) {
    pool.close().await;
}

/// Checks if the database file exists
pub fn database_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}
