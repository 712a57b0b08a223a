//! Service status handler.

use axum::{Json, response::IntoResponse};

/// Handler for the status endpoint.
///
/// # HTTP Request
///
/// `GET [base]/search/status`
pub async fn status_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "app": env!("CARGO_PKG_NAME"),
        "status": "online"
    }))
}
