//! Backend implementations.
//!
//! - [`sqlite`] - SQLite backend (feature `sqlite`, default)

#[cfg(feature = "sqlite")]
pub mod sqlite;
