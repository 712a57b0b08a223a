//! Search route configuration.

use axum::{
    Router,
    routing::{get, post},
};
use searchgate_persistence::core::FieldLimitStore;

use crate::handlers;
use crate::state::AppState;

/// Creates all gateway routes.
///
/// # Routes
///
/// ## Search
/// - `GET /search/query` - Search
/// - `GET /search/tvrh` - Term vectors
/// - `GET /search/qtree` - Query tree
/// - `POST /search/bigquery` - Bulk query
/// - `GET /search/status` - Service status
///
/// ## Probes
/// - `GET /health` - Health check
/// - `GET /_liveness` - Liveness
/// - `GET /_readiness` - Readiness
pub fn create_routes<S>(state: AppState<S>) -> Router
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    Router::new()
        // Search routes
        .route("/search/query", get(handlers::search_handler::<S>))
        .route("/search/tvrh", get(handlers::tvrh_handler::<S>))
        .route("/search/qtree", get(handlers::qtree_handler::<S>))
        .route("/search/bigquery", post(handlers::bigquery_handler::<S>))
        .route("/search/status", get(handlers::status_handler))
        // Probes
        .route("/health", get(handlers::health_handler::<S>))
        .route("/_liveness", get(handlers::liveness_handler))
        .route("/_readiness", get(handlers::readiness_handler::<S>))
        // State
        .with_state(state)
}
