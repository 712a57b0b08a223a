//! Saved-query lookup.
//!
//! The saved-query service returns `{"query": "<...>"}` where the inner value
//! is either the url-encoded query string itself or a JSON document holding
//! that query string and an optional `bigquery` list.

use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::info;

use crate::error::UpstreamError;
use crate::payload::RequestPayload;

const SERVICE: &str = "vault";

#[derive(Debug, Deserialize)]
struct VaultResponse {
    query: String,
}

#[derive(Debug, Default, Deserialize)]
struct StoredQuery {
    #[serde(default)]
    query: String,
    #[serde(default)]
    bigquery: Option<String>,
}

/// Extracts the content stream for `qid` from a stored query document.
pub fn stream_from_saved_query(qid: &str, stored: &str) -> Result<String, UpstreamError> {
    let stored: StoredQuery = serde_json::from_str(stored).unwrap_or_else(|_| StoredQuery {
        query: stored.to_string(),
        bigquery: None,
    });

    let params = RequestPayload::from_urlencoded(&stored.query);
    // blank values count as absent
    if let Some(value) = params
        .get(qid)
        .and_then(|v| v.values().iter().find(|s| !s.is_empty()))
    {
        return Ok(value.clone());
    }

    match stored.bigquery {
        Some(bigquery) if !bigquery.is_empty() => Ok(bigquery),
        _ => Err(UpstreamError::MissingContent {
            token: qid.to_string(),
        }),
    }
}

/// Fetches a saved query and returns its content stream.
pub async fn fetch_saved_stream(
    client: &reqwest::Client,
    endpoint: &str,
    qid: &str,
    headers: &HeaderMap,
) -> Result<String, UpstreamError> {
    let url = format!("{}/{}", endpoint.trim_end_matches('/'), qid);
    let response = client
        .get(&url)
        .headers(headers.clone())
        .send()
        .await
        .map_err(|source| UpstreamError::Transport {
            service: SERVICE,
            source,
        })?;

    if !response.status().is_success() {
        return Err(UpstreamError::Status {
            service: SERVICE,
            status: response.status().as_u16(),
        });
    }

    let body: VaultResponse = response
        .json()
        .await
        .map_err(|e| UpstreamError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;

    let stream = stream_from_saved_query(qid, &body.query)?;
    info!(qid, bytes = stream.len(), "Resolved saved query");
    Ok(stream)
}
