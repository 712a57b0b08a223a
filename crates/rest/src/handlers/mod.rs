//! HTTP request handlers.
//!
//! - [`search`] - Search, term-vector and query-tree endpoints
//! - [`bigquery`] - Bulk query endpoint
//! - [`status`] - Service status
//! - [`health`] - Health, liveness and readiness probes

pub mod bigquery;
pub mod health;
pub mod search;
pub mod status;

// Re-export handlers for convenience
pub use bigquery::bigquery_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use search::{qtree_handler, search_handler, tvrh_handler};
pub use status::status_handler;
