//! SQLite connection pool, migrations and readiness check.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use super::{Connector, StorageError, StorageHandle};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// How long SQLite waits for writes to reach disk before acknowledging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAck {
    Off,
    Normal,
    Full,
}

impl FromStr for WriteAck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(WriteAck::Off),
            "normal" => Ok(WriteAck::Normal),
            "full" => Ok(WriteAck::Full),
            other => Err(format!("unknown write acknowledgment level: {other}")),
        }
    }
}

impl From<WriteAck> for SqliteSynchronous {
    fn from(ack: WriteAck) -> Self {
        match ack {
            WriteAck::Off => SqliteSynchronous::Off,
            WriteAck::Normal => SqliteSynchronous::Normal,
            WriteAck::Full => SqliteSynchronous::Full,
        }
    }
}

/// Options handed through to the SQLite driver and pool.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageOptions {
    /// Connection target, e.g. `sqlite://data/feedback.db` or `sqlite::memory:`.
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for a locked database.
    pub busy_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub write_ack: WriteAck,
    pub create_if_missing: bool,
}

impl StorageOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            min_connections: 0,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            write_ack: WriteAck::Normal,
            create_if_missing: true,
        }
    }

    /// Private in-memory database, used by tests.
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Holds a connection pool to the SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database described by `options`, run migrations,
    /// check it, and return a ready-to-use `Database`.
    pub async fn open(options: &StorageOptions) -> Result<Self, StorageError> {
        if !options.url.starts_with("sqlite:") {
            return Err(StorageError::InvalidOptions(format!(
                "expected a sqlite: URL, got {}",
                options.url
            )));
        }

        let connect_options = SqliteConnectOptions::from_str(&options.url)
            .map_err(|e| StorageError::InvalidOptions(e.to_string()))?
            .create_if_missing(options.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(options.write_ack.into())
            .busy_timeout(options.busy_timeout)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .min_connections(options.min_connections)
            .max_connections(options.max_connections)
            .acquire_timeout(options.connect_timeout)
            .idle_timeout(options.idle_timeout);

        if options.is_in_memory() {
            // Every connection to `:memory:` is its own database, so pin the
            // pool to a single connection that is never recycled.
            pool_options = pool_options
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else if let Some(parent) = connect_options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Connect(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::Connect(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.ping().await?;
        Ok(db)
    }

    /// Create an in-memory database for testing. Migrations are applied.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        Self::open(&StorageOptions::in_memory()).await
    }

    /// Run embedded migrations from `server/migrations/`.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))
    }

    /// Readiness check.
    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Readiness(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl StorageHandle for Database {
    fn is_open(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// [`Connector`] that opens a [`Database`] from fixed options.
pub struct SqliteConnector {
    options: StorageOptions,
}

impl SqliteConnector {
    pub fn new(options: StorageOptions) -> Self {
        Self { options }
    }
}

impl Connector for SqliteConnector {
    type Handle = Database;

    async fn connect(&self) -> Result<Database, StorageError> {
        Database::open(&self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageManager;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::new_in_memory().await.unwrap();
        // Verify the pool is functional
        let row: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let db = Database::new_in_memory().await.unwrap();
        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(names.contains(&"feedback"));
        assert!(names.contains(&"users"));
    }

    #[tokio::test]
    async fn test_open_file_based_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("feedback.db");
        let options = StorageOptions::new(format!("sqlite://{}", db_path.display()));
        let db = Database::open(&options).await.unwrap();
        db.ping().await.unwrap();
        assert!(db_path.exists());
        db.close().await;
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let options = StorageOptions::new("postgres://localhost/feedback");
        let result = Database::open(&options).await;
        assert!(matches!(result, Err(StorageError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_manager_with_sqlite_connector() {
        let manager = StorageManager::new(SqliteConnector::new(StorageOptions::in_memory()));
        let db = manager.acquire().await.unwrap();
        db.ping().await.unwrap();
        assert!(manager.is_connected());
        manager.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_pool_closed_outside_manager_reconnects() {
        let manager = StorageManager::new(SqliteConnector::new(StorageOptions::in_memory()));
        let db = manager.acquire().await.unwrap();
        db.pool().close().await;
        assert!(!manager.is_connected());

        let reopened = manager.acquire().await.unwrap();
        assert!(!reopened.pool().is_closed());
        reopened.ping().await.unwrap();
        assert!(manager.is_connected());
    }

    #[test]
    fn test_write_ack_parse() {
        assert_eq!("off".parse::<WriteAck>().unwrap(), WriteAck::Off);
        assert_eq!("NORMAL".parse::<WriteAck>().unwrap(), WriteAck::Normal);
        assert_eq!("full".parse::<WriteAck>().unwrap(), WriteAck::Full);
        assert!("majority".parse::<WriteAck>().is_err());
    }
}
