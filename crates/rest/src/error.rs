//! Error types for the gateway.
//!
//! Every error ends up as a JSON body of the form `{"error": "<message>"}`.
//!
//! # Error Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | BadRequest | 400 |
//! | UnresolvedStream | 400 |
//! | Upstream | 502 |
//! | BadGateway | 502 |
//! | InternalError | 500 |
//!
//! Errors returned by the search backend itself are not represented here;
//! their status and body are relayed to the client unchanged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use searchgate_persistence::StorageError;
use std::fmt;
use thiserror::Error;

/// The primary error type for gateway operations.
#[derive(Debug)]
pub enum RestError {
    /// The request cannot be processed as sent (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// A `docs(...)` token could not be turned into a content stream (HTTP 400).
    UnresolvedStream {
        /// The token as written in the query.
        token: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A supporting service answered with a failure (HTTP 502).
    Upstream {
        /// Service name (`library`, `vault`).
        service: String,
        /// Error message.
        message: String,
    },

    /// The search backend could not be reached (HTTP 502).
    BadGateway {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::BadRequest { message } => write!(f, "{}", message),
            RestError::UnresolvedStream { token, reason } => {
                write!(f, "Cannot resolve content stream '{}': {}", token, reason)
            }
            RestError::Upstream { service, message } => {
                write!(f, "Error from {} service: {}", service, message)
            }
            RestError::BadGateway { message } => {
                write!(f, "Search backend unreachable: {}", message)
            }
            RestError::InternalError { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for RestError {}

impl RestError {
    /// Returns the HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::BadRequest { .. } | RestError::UnresolvedStream { .. } => {
                StatusCode::BAD_REQUEST
            }
            RestError::Upstream { .. } | RestError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a 400 with the given message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest {
            message: message.into(),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures of the library and saved-query services.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The service answered with a non-success status.
    #[error("{service} returned status {status}")]
    Status {
        /// Service name.
        service: &'static str,
        /// Returned HTTP status.
        status: u16,
    },

    /// The service could not be reached.
    #[error("{service} request failed: {source}")]
    Transport {
        /// Service name.
        service: &'static str,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a body that cannot be interpreted.
    #[error("{service} returned an unreadable response: {message}")]
    InvalidResponse {
        /// Service name.
        service: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A saved query holds no content for the requested token.
    #[error("saved query {token} has no content stream")]
    MissingContent {
        /// The saved-query id.
        token: String,
    },
}

impl UpstreamError {
    /// Service the error originated from.
    pub fn service(&self) -> &str {
        match self {
            UpstreamError::Status { service, .. }
            | UpstreamError::Transport { service, .. }
            | UpstreamError::InvalidResponse { service, .. } => service,
            UpstreamError::MissingContent { .. } => "vault",
        }
    }
}

/// Attaches the offending token to a resolution failure.
pub(crate) fn unresolved(token: &str, err: UpstreamError) -> RestError {
    match err {
        UpstreamError::MissingContent { .. } => RestError::UnresolvedStream {
            token: token.to_string(),
            reason: err.to_string(),
        },
        other => RestError::Upstream {
            service: other.service().to_string(),
            message: other.to_string(),
        },
    }
}

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        RestError::InternalError {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        RestError::BadGateway {
            message: err.to_string(),
        }
    }
}

/// Result type alias for gateway operations.
pub type RestResult<T> = Result<T, RestError>;
