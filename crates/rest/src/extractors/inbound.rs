//! Inbound request extractor.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{HeaderMap, Method, header},
};
use tracing::debug;

use crate::error::RestError;
use crate::payload::RequestPayload;

/// Header carrying the authenticated user id, set by the API front end.
pub const USER_ID_HEADER: &str = "x-api-uid";

/// User id assumed when the front end sent none.
pub const DEFAULT_USER_ID: &str = "default";

/// A file part of a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Multipart field name.
    pub field_name: String,
    /// File name given by the client.
    pub filename: Option<String>,
    /// MIME type given by the client.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Bytes,
}

/// Everything the gateway reads from an inbound request.
///
/// Parameters are kept apart by origin: the query string, form fields
/// (url-encoded bodies and multipart text parts), a JSON object body,
/// uploaded files and any other non-empty body as raw text.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Request method.
    pub method: Method,
    /// Request headers.
    pub headers: HeaderMap,
    /// Query-string parameters.
    pub query: RequestPayload,
    /// Form fields.
    pub form: RequestPayload,
    /// Members of a JSON object body.
    pub json: Option<RequestPayload>,
    /// Uploaded files, in request order.
    pub files: Vec<UploadedFile>,
    /// A body that is neither form, multipart nor JSON.
    pub raw_body: Option<String>,
}

impl InboundRequest {
    /// Returns the caller's user id.
    pub fn user_id(&self) -> &str {
        self.headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_USER_ID)
    }
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

impl<S> FromRequest<S> for InboundRequest
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut inbound = InboundRequest {
            method: req.method().clone(),
            headers: req.headers().clone(),
            query: RequestPayload::from_urlencoded(req.uri().query().unwrap_or_default()),
            ..Default::default()
        };
        let ctype = content_type(&inbound.headers);

        if ctype.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| RestError::bad_request(e.body_text()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| RestError::bad_request(e.body_text()))?
            {
                let name = field.name().unwrap_or_default().to_string();
                let filename = field.file_name().map(str::to_string);
                let part_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| RestError::bad_request(e.body_text()))?;

                if filename.is_some() {
                    inbound.files.push(UploadedFile {
                        field_name: name,
                        filename,
                        content_type: part_type,
                        bytes,
                    });
                } else {
                    inbound
                        .form
                        .append(name, String::from_utf8_lossy(&bytes).into_owned());
                }
            }
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| RestError::bad_request(e.body_text()))?;

            if body.is_empty() {
                // nothing to read
            } else if ctype.starts_with("application/x-www-form-urlencoded") {
                inbound.form = RequestPayload::from_urlencoded(&String::from_utf8_lossy(&body));
            } else if ctype.contains("json") {
                let value: serde_json::Value = serde_json::from_slice(&body)
                    .map_err(|e| RestError::bad_request(format!("Invalid JSON body: {}", e)))?;
                let object = value
                    .as_object()
                    .ok_or_else(|| RestError::bad_request("JSON body must be an object"))?;
                inbound.json = Some(RequestPayload::from_json(object));
            } else {
                inbound.raw_body = Some(String::from_utf8_lossy(&body).into_owned());
            }
        }

        debug!(
            method = %inbound.method,
            query = inbound.query.len(),
            form = inbound.form.len(),
            files = inbound.files.len(),
            raw_body = inbound.raw_body.is_some(),
            "Extracted inbound request"
        );

        Ok(inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    async fn extract(request: Request) -> InboundRequest {
        InboundRequest::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_query_string_only() {
        let request = Request::builder()
            .uri("/search/query?q=star&fl=id&fl=title")
            .body(Body::empty())
            .unwrap();
        let inbound = extract(request).await;
        assert_eq!(inbound.query.first("q"), Some("star"));
        assert!(inbound.query.get("fl").unwrap().is_multi());
        assert!(inbound.raw_body.is_none());
        assert_eq!(inbound.user_id(), DEFAULT_USER_ID);
    }

    #[tokio::test]
    async fn test_form_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/search/bigquery?rows=5")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(USER_ID_HEADER, "42")
            .body(Body::from("q=star&fq=%7B!bitset%7D"))
            .unwrap();
        let inbound = extract(request).await;
        assert_eq!(inbound.form.first("fq"), Some("{!bitset}"));
        assert_eq!(inbound.query.first("rows"), Some("5"));
        assert_eq!(inbound.user_id(), "42");
    }

    #[tokio::test]
    async fn test_json_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/search/bigquery")
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(Body::from(r#"{"q": "star", "rows": 3}"#))
            .unwrap();
        let inbound = extract(request).await;
        assert_eq!(inbound.json.unwrap().first("rows"), Some("3"));
    }

    #[tokio::test]
    async fn test_json_array_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/search/bigquery")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("[1, 2]"))
            .unwrap();
        assert!(InboundRequest::from_request(request, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_raw_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/search/bigquery?q=star")
            .header(header::CONTENT_TYPE, "big-query/csv")
            .body(Body::from("bibcode\n2020ApJ...1..1A"))
            .unwrap();
        let inbound = extract(request).await;
        assert_eq!(inbound.raw_body.as_deref(), Some("bibcode\n2020ApJ...1..1A"));
    }

    #[tokio::test]
    async fn test_multipart_body() {
        let body = "--XX\r\n\
            Content-Disposition: form-data; name=\"fq\"\r\n\r\n\
            {!bitset}\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"file_field\"; filename=\"list.csv\"\r\n\
            Content-Type: big-query/csv\r\n\r\n\
            bibcode\nX\r\n\
            --XX--\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/search/bigquery?q=star")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XX")
            .body(Body::from(body))
            .unwrap();
        let inbound = extract(request).await;
        assert_eq!(inbound.form.first("fq"), Some("{!bitset}"));
        assert_eq!(inbound.files.len(), 1);
        assert_eq!(inbound.files[0].field_name, "file_field");
        assert_eq!(inbound.files[0].filename.as_deref(), Some("list.csv"));
        assert_eq!(inbound.files[0].bytes, Bytes::from_static(b"bibcode\nX"));
    }
}
