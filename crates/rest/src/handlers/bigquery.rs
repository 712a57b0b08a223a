//! Bulk query handler.

use axum::{extract::State, response::Response};
use searchgate_persistence::core::FieldLimitStore;
use tracing::debug;

use crate::dispatch::{Endpoint, forward};
use crate::error::RestResult;
use crate::extractors::InboundRequest;
use crate::state::AppState;

/// Handler for the bulk query endpoint.
///
/// Parameters are merged from the form body, the query string and a JSON
/// body (later sources win). At least one content stream is required: an
/// uploaded file, a raw body or a `docs(...)` reference.
///
/// # HTTP Request
///
/// `POST [base]/search/bigquery?q=...`
///
/// # Response
///
/// - the backend's status and body
/// - `400 Bad Request` - no content stream, or too many in single-stream mode
pub async fn bigquery_handler<S>(
    State(state): State<AppState<S>>,
    inbound: InboundRequest,
) -> RestResult<Response>
where
    S: FieldLimitStore + Send + Sync + 'static,
{
    debug!(files = inbound.files.len(), "Processing bigquery request");
    forward(&state, Endpoint::BigQuery, inbound).await
}
