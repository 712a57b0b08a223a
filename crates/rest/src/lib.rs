//! # searchgate-rest - Policy-enforcing search gateway
//!
//! This crate implements an HTTP gateway that sits between API clients and a
//! Solr search backend. Clients send free-form search parameters; the gateway
//! rewrites, clamps and access-controls them before forwarding, and builds the
//! bulk document lists that queries reference with `docs(...)`.
//!
//! ## Features
//!
//! - **Parameter Sanitizing**: row, start, highlight and field-list limits
//!   with allow-lists for facets, stats, highlights and sorting
//! - **Field-Level Access Control**: restricted fields restored per user from
//!   the rule store, scoped by a filter query
//! - **Query Rewriting**: `citations()` / `references()` rewriting and
//!   second-order operator detection
//! - **Bulk Streams**: `docs(library/<id>)` and `docs(<qid>)` resolved into
//!   multipart content streams
//! - **Bot Routing**: callers holding a configured bot token use a separate
//!   backend pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use searchgate_rest::{create_app, GatewayConfig};
//! use searchgate_persistence::backends::sqlite::SqliteLimitStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteLimitStore::open("limits.db")?;
//!     store.init_schema()?;
//!
//!     let app = create_app(store);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | HTTP Method | Backend handler |
//! |----------|-------------|-----------------|
//! | `/search/query` | GET | `/select` (bots: bot `/select`) |
//! | `/search/tvrh` | GET | `/tvrh` |
//! | `/search/qtree` | GET | `/qtree` |
//! | `/search/bigquery` | POST | `/bigquery` (bots: bot `/bigquery`) |
//! | `/search/status` | GET | - |
//!
//! Any request carrying content streams is sent to the bulk handler.
//!
//! ## HTTP Headers
//!
//! - `X-api-uid` - Caller's user id (default `default`)
//! - `Authorization` / `X-Forwarded-Authorization` - Bearer token, used for
//!   bot classification and propagated to supporting services
//! - `X-Amzn-Trace-Id` - Passed to the backend for log correlation
//! - `Cookie` - Only configured cookie names are forwarded
//!
//! ## Error Handling
//!
//! Errors are returned as `{"error": "<message>"}`:
//!
//! | HTTP Status | Description |
//! |-------------|-------------|
//! | 400 | Malformed request or unresolvable `docs(...)` token |
//! | 500 | Rule store failure |
//! | 502 | Supporting service failure or unreachable backend |
//!
//! Backend errors are relayed with their own status and body.
//!
//! ## Architecture
//!
//! - [`config`] - Gateway configuration
//! - [`error`] - Error types
//! - [`state`] - Application state (rule store, configuration, HTTP client)
//! - [`payload`] - Ordered multi-valued parameters
//! - [`sanitizer`] - Parameter normalization
//! - [`access`] - Field-level access control
//! - [`query`] - Second-order query detection and rewriting
//! - [`bulk`] - Content stream resolution
//! - [`dispatch`] - Handler selection and the request pipeline
//! - [`extractors`] - Axum extractors
//! - [`handlers`] - HTTP request handlers
//! - [`responses`] - Response relaying
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod access;
pub mod bulk;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod payload;
pub mod query;
pub mod responses;
pub mod routing;
pub mod sanitizer;
pub mod state;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::{RestError, RestResult};
pub use payload::{ParamValue, RequestPayload};
pub use state::AppState;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use searchgate_persistence::core::FieldLimitStore;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application with default configuration.
///
/// For more control, use [`create_app_with_config`].
pub fn create_app<S>(store: S) -> Router
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    create_app_with_config(store, GatewayConfig::default())
}

/// Creates the Axum application with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use searchgate_rest::{create_app_with_config, GatewayConfig};
/// use searchgate_persistence::backends::sqlite::SqliteLimitStore;
///
/// let store = SqliteLimitStore::in_memory()?;
/// let config = GatewayConfig {
///     solr_url: "http://solr:8983/solr".to_string(),
///     ..Default::default()
/// };
/// let app = create_app_with_config(store, config);
/// ```
pub fn create_app_with_config<S>(store: S, config: GatewayConfig) -> Router
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    info!(
        backend = store.backend_name(),
        solr_url = %config.solr_url,
        "Creating search gateway"
    );

    let state = AppState::new(Arc::new(store), config);
    create_app_with_state(state)
}

/// Creates the Axum application around prepared state.
pub fn create_app_with_state<S>(state: AppState<S>) -> Router
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    let config = state.config().clone();

    let router = routing::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    // Add CORS if enabled
    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    router
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &GatewayConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "searchgate={level},searchgate_rest={level},searchgate_persistence={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
