//! SQLite backend implementation.
//!
//! Supports in-memory databases (tests, ephemeral deployments) and
//! file-based databases.
//!
//! # Example
//!
//! ```no_run
//! use searchgate_persistence::backends::sqlite::SqliteLimitStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteLimitStore::open("limits.db")?;
//! store.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE limits (
//!     id INTEGER PRIMARY KEY,
//!     uid TEXT NOT NULL,
//!     field TEXT,
//!     filter TEXT
//! );
//! CREATE INDEX ix_uid ON limits(uid);
//! ```

mod backend;
mod schema;

pub use backend::{SqliteLimitStore, SqliteStoreConfig};
pub use schema::SCHEMA_VERSION;
