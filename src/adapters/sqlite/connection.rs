//! Opening the governance store.
//!
//! The store is either a WAL-mode file, so decisions and audits survive a
//! restart, or a private in-memory database that lives exactly as long as
//! its one connection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

/// How long a writer waits on a locked database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to open governance store at {location}: {source}")]
    Open {
        location: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to create directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Governance store is not answering: {0}")]
    Unreachable(#[source] sqlx::Error),
}

/// Where the governance store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts a bare path, a `sqlite:` / `sqlite://` URL, or `:memory:`.
    pub fn parse(raw: &str) -> Self {
        let path = raw
            .strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
            .unwrap_or(raw);
        if path.is_empty() || path == ":memory:" {
            Self::Memory
        } else {
            Self::File(PathBuf::from(path))
        }
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        match self {
            // The default filename is `:memory:`
            Self::Memory => SqliteConnectOptions::new().foreign_keys(true),
            Self::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .foreign_keys(true)
                .busy_timeout(BUSY_TIMEOUT),
        }
    }
}

impl std::fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str(":memory:"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(3),
        }
    }
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            ..Self::default()
        }
    }
}

/// Open a pool on the store.
///
/// An in-memory store is pinned to a single connection that never idles
/// out; a second connection would see a different, empty database.
pub async fn create_pool(location: &DatabaseLocation, config: &PoolConfig) -> Result<SqlitePool, ConnectionError> {
    let options = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout);
    let options = match location {
        DatabaseLocation::Memory => options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None),
        DatabaseLocation::File(path) => {
            ensure_parent_directory(path)?;
            options.max_connections(config.max_connections).min_connections(1)
        }
    };

    let pool = options
        .connect_with(location.connect_options())
        .await
        .map_err(|source| ConnectionError::Open {
            location: location.to_string(),
            source,
        })?;

    tracing::debug!(%location, max_connections = pool.options().get_max_connections(), "Governance store opened");
    Ok(pool)
}

/// Private in-memory store with the single-connection pinning of `create_pool`.
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    create_pool(&DatabaseLocation::Memory, &PoolConfig::default()).await
}

fn ensure_parent_directory(path: &Path) -> Result<(), ConnectionError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|source| ConnectionError::Directory {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

pub async fn verify_connection(pool: &SqlitePool) -> Result<(), ConnectionError> {
    let (version,): (String,) = sqlx::query_as("SELECT sqlite_version()")
        .fetch_one(pool)
        .await
        .map_err(ConnectionError::Unreachable)?;
    tracing::trace!(sqlite_version = %version, "Governance store reachable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parsing() {
        assert_eq!(
            DatabaseLocation::parse(".cadence/cadence.db"),
            DatabaseLocation::File(PathBuf::from(".cadence/cadence.db"))
        );
        assert_eq!(
            DatabaseLocation::parse("sqlite://runs/task-1.db"),
            DatabaseLocation::File(PathBuf::from("runs/task-1.db"))
        );
        assert_eq!(DatabaseLocation::parse("sqlite::memory:"), DatabaseLocation::Memory);
        assert_eq!(DatabaseLocation::parse(":memory:"), DatabaseLocation::Memory);
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("cadence.db");

        let pool = create_pool(&DatabaseLocation::File(path.clone()), &PoolConfig::default())
            .await
            .unwrap();
        verify_connection(&pool).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_memory_store_keeps_state_on_its_single_connection() {
        let pool = create_test_pool().await.unwrap();
        sqlx::query("CREATE TABLE heartbeat (n INTEGER)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO heartbeat (n) VALUES (7)").execute(&pool).await.unwrap();

        let (n,): (i64,) = sqlx::query_as("SELECT n FROM heartbeat")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 7);
        assert_eq!(pool.options().get_max_connections(), 1);
    }
}
