//! searchgate persistence layer
//!
//! This crate stores the access-control rules consulted by the gateway when a
//! client asks for a restricted response field. A rule grants one user one
//! field, together with a filter query that scopes the results that user may
//! see while the field is visible.
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite with in-memory and file modes
//!
//! # Architecture
//!
//! - [`types`] - The [`FieldLimit`](types::FieldLimit) rule record
//! - [`error`] - Error types for all operations
//! - [`core`] - The [`FieldLimitStore`](core::FieldLimitStore) trait
//! - [`backends`] - Backend implementations
//!
//! # Quick Start
//!
//! ```no_run
//! use searchgate_persistence::backends::sqlite::SqliteLimitStore;
//! use searchgate_persistence::core::FieldLimitStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteLimitStore::in_memory()?;
//! store.init_schema()?;
//! store.insert_limit("9", "full", Some("bibstem:apj"))?;
//!
//! let rules = store
//!     .limits_for("9", &["full".to_string()])
//!     .await?;
//! assert_eq!(rules[0].filter.as_deref(), Some("bibstem:apj"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use types::FieldLimit;
