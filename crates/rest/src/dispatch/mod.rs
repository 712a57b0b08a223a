//! Request pipeline from inbound parameters to the backend response.
//!
//! Every search endpoint runs the same sequence:
//!
//! 1. pick the caller class (regular or bot)
//! 2. sanitize parameters and apply field-level access rules
//! 3. merge injected parameters
//! 4. rewrite citation queries
//! 5. resolve `docs(...)` references into content streams
//! 6. choose the backend handler and send the request
//! 7. post-process highlights and relay the response

pub mod citations;
pub mod handler;
pub mod outbound;
pub mod postprocess;

pub use handler::{Endpoint, HandlerSelector, HandlerVariant, bearer_token, is_bot};
pub use outbound::forwarded_cookies;
pub use postprocess::filter_highlights;

use axum::http::{HeaderValue, header};
use axum::response::Response;
use bytes::Bytes;
use searchgate_persistence::core::FieldLimitStore;
use tracing::{debug, info};

use crate::access::apply_protective_filters;
use crate::bulk::{BulkStreamResolver, mark_bulk_filter};
use crate::error::{RestError, RestResult};
use crate::extractors::InboundRequest;
use crate::payload::{ParamValue, RequestPayload};
use crate::query::{identifier_value, is_second_order, rewrite_citations, sub_bibcode};
use crate::responses::relay;
use crate::sanitizer::{ParameterSanitizer, authority};
use crate::state::AppState;

/// Message returned when more streams were uploaded than allowed.
pub const SINGLE_STREAM_MESSAGE: &str = "You can only pass one content stream.";

/// Message returned for a bulk request without any stream.
pub const MALFORMED_MESSAGE: &str = "Malformed request";

/// Runs the full pipeline for one request.
pub async fn forward<S>(
    state: &AppState<S>,
    endpoint: Endpoint,
    inbound: InboundRequest,
) -> RestResult<Response>
where
    S: FieldLimitStore + Send + Sync,
{
    let config = state.config();
    let user_id = inbound.user_id().to_string();
    let InboundRequest {
        headers,
        query,
        form,
        json,
        files,
        raw_body,
        ..
    } = inbound;

    let handlers = endpoint.handlers(config);
    let mut variant =
        HandlerVariant::for_caller(endpoint.classifies_bots() && is_bot(&headers, &config.bot_tokens));

    let mut payload = match endpoint {
        Endpoint::BigQuery => {
            let mut merged = form.clone();
            merged.merge(query);
            if let Some(json) = json {
                merged.merge(json);
            }
            merged
        }
        _ => query,
    };

    let sanitized =
        ParameterSanitizer::new(config).normalize(&mut payload, &headers, handlers.get(variant));
    let mut outbound_headers = sanitized.headers;

    for restricted in &sanitized.restricted {
        apply_protective_filters(
            state.store(),
            &mut payload,
            &user_id,
            &restricted.fields,
            &restricted.key,
        )
        .await?;
    }

    for (key, value) in config.injected_params() {
        payload.set(key, value);
    }

    if endpoint.rewrites_queries() {
        rewrite_queries(state, variant, &mut payload).await?;
    }

    if config.single_content_stream && files.len() > 1 {
        return Err(RestError::bad_request(SINGLE_STREAM_MESSAGE));
    }

    let resolver = BulkStreamResolver::new(state.client(), config, &headers);
    let streams = resolver
        .resolve(&mut payload, &form, &files, raw_body.as_deref())
        .await?;

    if !streams.is_empty() {
        variant = variant.with_streams();
        outbound_headers.remove(header::CONTENT_TYPE);
        if endpoint == Endpoint::BigQuery {
            mark_bulk_filter(&mut payload);
        }
    } else if endpoint == Endpoint::BigQuery {
        return Err(RestError::bad_request(MALFORMED_MESSAGE));
    }

    let url = handlers.get(variant).to_string();
    if let Some(host) = authority(&url).and_then(|h| HeaderValue::from_str(&h).ok()) {
        outbound_headers.insert(header::HOST, host);
    }

    let postprocess = endpoint == Endpoint::Search
        && !config.disallowed_highlight_publishers.is_empty()
        && payload.contains_key("hl");
    if postprocess {
        request_publisher_field(&mut payload);
    }

    let cookie = forwarded_cookies(&headers, &config.forwarded_cookies);

    info!(
        endpoint = endpoint.as_str(),
        handler = variant.as_str(),
        url = %url,
        user_id = %user_id,
        streams = streams.len(),
        "Dispatching request"
    );

    let response = outbound::send(
        state.client(),
        &url,
        &payload,
        outbound_headers,
        &streams,
        cookie,
    )
    .await?;

    let status = response.status();
    let backend_headers = response.headers().clone();
    let body = response.bytes().await?;

    info!(url = %url, status = status.as_u16(), "Received backend response");

    let body = if postprocess && status.is_success() {
        filter_highlights(
            &body,
            &config.disallowed_highlight_publishers,
            &config.unhighlightable_keys,
        )
        .map(Bytes::from)
        .unwrap_or(body)
    } else {
        body
    };

    Ok(relay(status, body, &backend_headers, config))
}

/// Rewrites top-level citation queries and drops the time budget for
/// second-order queries.
async fn rewrite_queries<S>(
    state: &AppState<S>,
    variant: HandlerVariant,
    payload: &mut RequestPayload,
) -> RestResult<()>
where
    S: FieldLimitStore + Send + Sync,
{
    if let Some(q) = payload.get("q") {
        let (mut rewritten, original) = rewrite_citations(q);

        if let Some(expr) = original.as_deref() {
            if let Some(identifier) = identifier_value(expr) {
                let search_url = if variant.is_bot() {
                    state.config().bot_search_handler()
                } else {
                    state.config().search_handler()
                };
                if let Some(bibcode) =
                    citations::lookup_bibcode(state.client(), &search_url, identifier).await?
                {
                    let mut values = rewritten.into_values();
                    if let Some(first) = values.first_mut() {
                        *first = sub_bibcode(first, &bibcode);
                    }
                    rewritten = ParamValue::Multi(values);
                }
            }
            info!(original = %expr, "Rewrote citation query");
        }

        payload.set("q", rewritten);
    }

    let second_order = payload
        .keys_matching("q")
        .iter()
        .filter_map(|key| payload.get(key))
        .any(|value| value.values().iter().any(|v| is_second_order(v)));

    if second_order && payload.remove("timeAllowed").is_some() {
        debug!("Dropped timeAllowed for second-order query");
    }

    Ok(())
}

/// Adds `publisher` to `fl` so highlights can be filtered by publisher.
fn request_publisher_field(payload: &mut RequestPayload) {
    let fl = payload.first("fl").unwrap_or("id");
    if !fl.split(',').any(|f| f == "publisher") {
        let fl = format!("{},publisher", fl);
        payload.set("fl", fl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_field_added_once() {
        let mut payload = RequestPayload::from_urlencoded("fl=id,title");
        request_publisher_field(&mut payload);
        assert_eq!(payload.first("fl"), Some("id,title,publisher"));
        request_publisher_field(&mut payload);
        assert_eq!(payload.first("fl"), Some("id,title,publisher"));
    }
}
