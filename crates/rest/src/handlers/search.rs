//! Search, term-vector and query-tree handlers.

use axum::{extract::State, response::Response};
use searchgate_persistence::core::FieldLimitStore;
use tracing::debug;

use crate::dispatch::{Endpoint, forward};
use crate::error::RestResult;
use crate::extractors::InboundRequest;
use crate::state::AppState;

/// Handler for the search endpoint.
///
/// # HTTP Request
///
/// `GET [base]/search/query?q=...`
///
/// Bot callers are routed to the bot pool; queries using `docs(...)` are
/// sent to the bulk handler with their content streams.
pub async fn search_handler<S>(
    State(state): State<AppState<S>>,
    inbound: InboundRequest,
) -> RestResult<Response>
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    debug!("Processing search request");
    forward(&state, Endpoint::Search, inbound).await
}

/// Handler for the term-vector endpoint.
///
/// # HTTP Request
///
/// `GET [base]/search/tvrh?q=...`
pub async fn tvrh_handler<S>(
    State(state): State<AppState<S>>,
    inbound: InboundRequest,
) -> RestResult<Response>
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    debug!("Processing tvrh request");
    forward(&state, Endpoint::Tvrh, inbound).await
}

/// Handler for the query-tree endpoint.
///
/// # HTTP Request
///
/// `GET [base]/search/qtree?q=...`
pub async fn qtree_handler<S>(
    State(state): State<AppState<S>>,
    inbound: InboundRequest,
) -> RestResult<Response>
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    debug!("Processing qtree request");
    forward(&state, Endpoint::Qtree, inbound).await
}
