//! SQLite schema definitions and migrations.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        // Fresh database - create base schema then run all migrations
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

fn internal(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

/// Get the current schema version.
pub(crate) fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| internal(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| internal(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS limits (
            id INTEGER PRIMARY KEY,
            uid TEXT NOT NULL,
            field TEXT,
            filter TEXT NOT NULL
        )",
        [],
    )
    .map_err(|e| internal(format!("Failed to create limits table: {}", e)))?;

    conn.execute("CREATE INDEX IF NOT EXISTS ix_uid ON limits(uid)", [])
        .map_err(|e| internal(format!("Failed to create ix_uid index: {}", e)))?;

    Ok(())
}

/// Run migrations from the given version to the current version.
fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            _ => {
                return Err(StorageError::Backend(BackendError::MigrationError {
                    message: format!("Unknown schema version: {}", version),
                }));
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

/// Migrate from schema version 1 to version 2.
///
/// Rules without a filter are legal (they keep the field blocked), so the
/// NOT NULL constraint on `filter` is dropped. SQLite cannot alter a column
/// constraint in place, so the table is rebuilt.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    let statements = [
        "CREATE TABLE limits_v2 (
            id INTEGER PRIMARY KEY,
            uid TEXT NOT NULL,
            field TEXT,
            filter TEXT
        )",
        "INSERT INTO limits_v2 (id, uid, field, filter) SELECT id, uid, field, filter FROM limits",
        "DROP TABLE limits",
        "ALTER TABLE limits_v2 RENAME TO limits",
        "CREATE INDEX IF NOT EXISTS ix_uid ON limits(uid)",
    ];

    for sql in &statements {
        conn.execute(sql, []).map_err(|e| {
            StorageError::Backend(BackendError::MigrationError {
                message: format!("v1 -> v2 failed on '{}': {}", sql, e),
            })
        })?;
    }

    Ok(())
}
