//! SQLite rule store implementation.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{TransactionBehavior, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::FieldLimitStore;
use crate::error::{BackendError, RuleError, StorageError, StorageResult};
use crate::types::FieldLimit;

use super::schema;

/// SQLite store for access-control rules.
pub struct SqliteLimitStore {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteStoreConfig,
    is_memory: bool,
}

impl Debug for SqliteLimitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLimitStore")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better read concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

fn query_error(e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::QueryError {
        message: e.to_string(),
    })
}

impl SqliteLimitStore {
    /// Creates a new in-memory SQLite store.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteStoreConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteStoreConfig::default())
    }

    /// Creates a store with custom configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteStoreConfig) -> StorageResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";

        // Every in-memory connection is its own database, so memory mode
        // pins a single connection for the lifetime of the pool.
        let (manager, builder) = if is_memory {
            (
                SqliteConnectionManager::memory(),
                Pool::builder()
                    .max_size(1)
                    .min_idle(Some(1))
                    .idle_timeout(None)
                    .max_lifetime(None),
            )
        } else {
            (
                SqliteConnectionManager::file(path.as_ref()),
                Pool::builder()
                    .max_size(config.max_connections)
                    .min_idle(Some(config.min_connections)),
            )
        };

        let pool = builder
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| {
                StorageError::Backend(BackendError::ConnectionFailed {
                    backend_name: "sqlite".to_string(),
                    message: e.to_string(),
                })
            })?;

        let store = Self {
            pool,
            config,
            is_memory,
        };

        store.configure_connection()?;

        Ok(store)
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Configure connection settings.
    fn configure_connection(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;

        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms as u64))
            .map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: "sqlite".to_string(),
                    message: format!("Failed to set busy timeout: {}", e),
                    source: None,
                })
            })?;

        if self.config.enable_wal && !self.is_memory {
            // journal_mode returns the resulting mode as a row
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| {
                    StorageError::Backend(BackendError::Internal {
                        backend_name: "sqlite".to_string(),
                        message: format!("Failed to enable WAL mode: {}", e),
                        source: None,
                    })
                })?;
        }

        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Adds a rule and returns its row id.
    ///
    /// Provisioning entry point for administrative tooling and tests; the
    /// gateway itself only reads rules.
    pub fn insert_limit(
        &self,
        user_id: &str,
        field: &str,
        filter: Option<&str>,
    ) -> StorageResult<i64> {
        if user_id.is_empty() {
            return Err(RuleError::EmptyUserId.into());
        }
        if field.trim().is_empty() {
            return Err(RuleError::EmptyField {
                user_id: user_id.to_string(),
            }
            .into());
        }

        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO limits (uid, field, filter) VALUES (?1, ?2, ?3)",
            params![user_id, field.trim().to_lowercase(), filter],
        )
        .map_err(query_error)?;

        Ok(conn.last_insert_rowid())
    }

    /// Removes every rule of a user, returning how many were deleted.
    pub fn delete_limits_for(&self, user_id: &str) -> StorageResult<usize> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM limits WHERE uid = ?1", [user_id])
            .map_err(query_error)
    }
}

#[async_trait]
impl FieldLimitStore for SqliteLimitStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn limits_for(&self, user_id: &str, fields: &[String]) -> StorageResult<Vec<FieldLimit>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(query_error)?;

        let placeholders = (0..fields.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, uid, field, filter FROM limits \
             WHERE uid = ?1 AND field IN ({}) ORDER BY id",
            placeholders
        );

        let rules = {
            let mut stmt = tx.prepare(&sql).map_err(query_error)?;
            let bound = std::iter::once(user_id).chain(fields.iter().map(String::as_str));
            let rows = stmt
                .query_map(params_from_iter(bound), |row| {
                    Ok(FieldLimit {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        field: row.get(2)?,
                        filter: row.get(3)?,
                    })
                })
                .map_err(query_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(query_error)?
        };

        tx.commit().map_err(query_error)?;

        debug!(user_id = %user_id, fields = ?fields, matched = rules.len(), "Looked up field limits");

        Ok(rules)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_connection().map_err(|_| {
            StorageError::Backend(BackendError::Unavailable {
                backend_name: "sqlite".to_string(),
                message: "Failed to get connection".to_string(),
            })
        })?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(query_error)
    }
}
