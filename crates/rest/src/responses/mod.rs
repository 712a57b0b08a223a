//! Relaying backend responses to the client.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;

use crate::config::GatewayConfig;

/// Builds the client response from a backend response.
///
/// The body and status are passed through. The response is always labelled
/// JSON, carries the service `Server` header, a `Cache-Control` header on
/// `200 OK` and any `Set-Cookie` the backend issued (backend affinity).
pub fn relay(
    status: StatusCode,
    body: Bytes,
    backend_headers: &HeaderMap,
    config: &GatewayConfig,
) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Ok(server) =
        HeaderValue::from_str(&format!("Solr Microservice {}", config.service_version))
    {
        headers.insert(header::SERVER, server);
    }
    if status == StatusCode::OK
        && let Ok(cache) = HeaderValue::from_str(&config.cache_control)
    {
        headers.insert(header::CACHE_CONTROL, cache);
    }
    for cookie in backend_headers.get_all(header::SET_COOKIE) {
        headers.append(header::SET_COOKIE, cookie.clone());
    }

    response
}
