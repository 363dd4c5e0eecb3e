//! # Catalog Database
//!
//! Opens the SQLite file behind the record store, applies the embedded
//! migrations and hands back a connection pool.
//!
//! The catalog must survive a crash between any two store calls, so every
//! file-backed connection runs in WAL mode with `synchronous = FULL`: once a
//! write returns it is on disk. In-memory databases are for tests only and are
//! pinned to one connection, since each `:memory:` connection is its own database.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//! use core_library::RecordStore;
//!
//! let pool = create_pool(DatabaseConfig::new("/data/gallery/catalog.db")).await?;
//! let store = RecordStore::new(pool);
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the catalog lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

/// Connection settings for the catalog database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    pub max_connections: u32,
    /// How long a store call may wait for a free connection
    pub acquire_timeout: Duration,
    /// How long SQLite retries when another connection holds the write lock
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(database_path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::InMemory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Ignored for in-memory databases.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            DatabaseLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            DatabaseLocation::InMemory => SqliteConnectOptions::new().in_memory(true),
        };

        options
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let pool = SqlitePoolOptions::new().acquire_timeout(self.acquire_timeout);
        match self.location {
            DatabaseLocation::File(_) => pool
                .min_connections(1)
                .max_connections(self.max_connections.max(1))
                .idle_timeout(Some(Duration::from_secs(600))),
            DatabaseLocation::InMemory => pool
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }

    fn describe(&self) -> String {
        match &self.location {
            DatabaseLocation::File(path) => path.display().to_string(),
            DatabaseLocation::InMemory => ":memory:".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the pool, migrate the schema and check that a query goes through.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    let database = config.describe();
    info!(database = %database, max_connections = config.max_connections, "Opening catalog database");

    let pool = config
        .pool_options()
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            warn!(database = %database, error = %e, "Failed to open catalog database");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    debug!(database = %database, connections = pool.size(), "Catalog database ready");
    Ok(pool)
}

/// Migrated in-memory pool for tests.
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

/// Whether a catalog database already exists at `path`.
pub fn database_exists(path: &Path) -> bool {
    path.is_file()
}

async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| LibraryError::Migration(e.to_string()))?;
    debug!("Catalog schema is current");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scalar_text(pool: &Pool<Sqlite>, sql: &str) -> String {
        let row: (String,) = sqlx::query_as(&format!("SELECT CAST(({}) AS TEXT)", sql))
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = create_test_pool().await.unwrap();

        for table in ["media_items", "directories", "vault_ledger"] {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count, 1, "{} table should exist", table);
        }
    }

    #[tokio::test]
    async fn test_file_database_is_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        assert!(!database_exists(&path));

        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        assert!(database_exists(&path));

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        // 2 = FULL
        let (sync,): (i64,) = sqlx::query_as("PRAGMA synchronous")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(sync, 2);
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        sqlx::query(
            "INSERT INTO vault_ledger (vault_path, original_path, hidden_at, original_name, size_bytes) \
             VALUES ('/v/1_a.jpg', '/a.jpg', 1, 'a.jpg', 10)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        assert_eq!(scalar_text(&pool, "SELECT COUNT(*) FROM vault_ledger").await, "1");
    }

    #[tokio::test]
    async fn test_in_memory_pool_is_single_connection() {
        let config = DatabaseConfig::in_memory().max_connections(8);
        let pool = create_pool(config).await.unwrap();

        // A second connection would see an empty, unmigrated database.
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    sqlx::query("SELECT COUNT(*) FROM media_items")
                        .fetch_one(&pool)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
