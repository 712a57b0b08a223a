//! Outbound requests to the search backend.

use axum::http::{HeaderMap, HeaderValue, header};
use reqwest::multipart::{Form, Part};

use crate::bulk::ContentStream;
use crate::error::{RestError, RestResult};
use crate::payload::RequestPayload;

/// Builds the `Cookie` header forwarded to the backend.
///
/// Only cookies named in `allowed` survive; the first non-empty value of
/// each name wins.
pub fn forwarded_cookies(headers: &HeaderMap, allowed: &[String]) -> Option<HeaderValue> {
    let cookies: Vec<(&str, &str)> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .collect();

    let kept: Vec<String> = allowed
        .iter()
        .filter_map(|name| {
            cookies
                .iter()
                .find(|(n, v)| n == name && !v.is_empty())
                .map(|(n, v)| format!("{}={}", n, v))
        })
        .collect();

    if kept.is_empty() {
        return None;
    }
    HeaderValue::from_str(&kept.join("; ")).ok()
}

/// Sends the request to `url`.
///
/// With content streams the parameters travel in the URL and the streams
/// as multipart files; otherwise the parameters are the form-encoded body.
pub async fn send(
    client: &reqwest::Client,
    url: &str,
    payload: &RequestPayload,
    mut headers: HeaderMap,
    streams: &[ContentStream],
    cookie: Option<HeaderValue>,
) -> RestResult<reqwest::Response> {
    if let Some(cookie) = cookie {
        headers.insert(header::COOKIE, cookie);
    }

    let request = if streams.is_empty() {
        client
            .post(url)
            .headers(headers)
            .body(payload.to_urlencoded())
    } else {
        let mut form = Form::new();
        for stream in streams {
            let part = Part::bytes(stream.bytes.to_vec())
                .file_name(stream.filename.clone())
                .mime_str(&stream.content_type)
                .map_err(|_| {
                    RestError::bad_request(format!(
                        "Invalid content type for stream {}: {}",
                        stream.name, stream.content_type
                    ))
                })?;
            form = form.part(stream.name.clone(), part);
        }
        headers.remove(header::CONTENT_TYPE);
        client
            .post(url)
            .headers(headers)
            .query(&payload.to_pairs())
            .multipart(form)
    };

    Ok(request.send().await?)
}
