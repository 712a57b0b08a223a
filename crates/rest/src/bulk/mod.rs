//! Resolution of bulk document lists into outbound content streams.
//!
//! A query can reference a list of documents with `docs(<token>)`. Before
//! the query is forwarded, every token must be backed by a content stream
//! sent along as a multipart file. Streams come, in order of preference,
//! from a request parameter of the same name, a form field, an uploaded
//! file, a library (`docs(library/<id>)`) or a saved query (`docs(<qid>)`).

pub mod library;
pub mod saved_query;

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use bytes::Bytes;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::error::{RestError, RestResult, unresolved};
use crate::extractors::UploadedFile;
use crate::payload::{ParamValue, RequestPayload};
use crate::query::extract_docs_tokens;

pub use library::{LibraryHarvest, harvest_library};
pub use saved_query::{fetch_saved_stream, stream_from_saved_query};

/// Filter-query marker telling the backend to intersect with the stream.
pub const BULK_MARKER: &str = "{!bitset}";

/// Stream name used for a raw request body.
pub const LEGACY_STREAM: &str = "old-bad-behaviour";

/// Content type of generated streams.
pub const STREAM_CONTENT_TYPE: &str = "big-query/csv";

/// Headers copied onto calls to the library and saved-query services.
const PROPAGATED_HEADERS: &[&str] = &[
    "authorization",
    "x-forwarded-authorization",
    "x-amzn-trace-id",
];

/// A file queued for the outbound multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStream {
    /// Multipart field name.
    pub name: String,
    /// File name reported for the part.
    pub filename: String,
    /// Stream contents.
    pub bytes: Bytes,
    /// MIME type of the part.
    pub content_type: String,
}

impl ContentStream {
    /// A generated CSV stream named after its token.
    pub fn generated(token: &str, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: token.to_string(),
            filename: token.to_string(),
            bytes: bytes.into(),
            content_type: STREAM_CONTENT_TYPE.to_string(),
        }
    }

    fn uploaded(file: &UploadedFile) -> Self {
        Self {
            name: file.field_name.clone(),
            filename: file
                .filename
                .clone()
                .unwrap_or_else(|| file.field_name.clone()),
            bytes: file.bytes.clone(),
            content_type: file
                .content_type
                .clone()
                .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string()),
        }
    }
}

/// Collects the `docs(...)` tokens of every query-like parameter.
///
/// Any parameter whose name contains `q` is inspected, which covers nested
/// queries such as `cites.q`.
pub fn collect_tokens(payload: &RequestPayload) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for (key, value) in payload.iter() {
        if !key.contains('q') {
            continue;
        }
        for token in value.values().iter().flat_map(|v| extract_docs_tokens(v)) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    tokens
}

/// Makes sure the filter queries carry [`BULK_MARKER`].
pub fn mark_bulk_filter(payload: &mut RequestPayload) {
    let Some(existing) = payload.get_mut("fq") else {
        payload.set("fq", ParamValue::Multi(vec![BULK_MARKER.to_string()]));
        return;
    };
    match existing {
        ParamValue::Single(fq) => {
            if !fq.contains(BULK_MARKER) {
                fq.push(' ');
                fq.push_str(BULK_MARKER);
            }
        }
        ParamValue::Multi(fqs) => {
            if !fqs.iter().any(|fq| fq.contains("!bitset")) {
                fqs.push(BULK_MARKER.to_string());
            }
        }
    }
}

/// Turns bulk references into content streams.
pub struct BulkStreamResolver<'a> {
    client: &'a reqwest::Client,
    config: &'a GatewayConfig,
    headers: HeaderMap,
}

impl<'a> BulkStreamResolver<'a> {
    /// Creates a resolver; credentials and trace headers are taken from
    /// `inbound` and sent to the supporting services.
    pub fn new(client: &'a reqwest::Client, config: &'a GatewayConfig, inbound: &HeaderMap) -> Self {
        let mut headers = HeaderMap::new();
        for name in PROPAGATED_HEADERS {
            let name = HeaderName::from_static(*name);
            if let Some(value) = inbound.get(&name) {
                headers.insert(name, value.clone());
            }
        }
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            client,
            config,
            headers,
        }
    }

    /// Resolves every token referenced by `payload`.
    ///
    /// `form` holds form fields that were not merged into the payload,
    /// `files` the uploaded files and `raw_body` a non-form request body.
    /// Uploaded files that no token asked for are passed through unchanged.
    pub async fn resolve(
        &self,
        payload: &mut RequestPayload,
        form: &RequestPayload,
        files: &[UploadedFile],
        raw_body: Option<&str>,
    ) -> RestResult<Vec<ContentStream>> {
        let mut tokens = collect_tokens(payload);

        if let Some(body) = raw_body.filter(|b| !b.is_empty()) {
            mark_bulk_filter(payload);
            if !tokens.iter().any(|t| t == LEGACY_STREAM) {
                tokens.push(LEGACY_STREAM.to_string());
            }
            payload.set(LEGACY_STREAM, body);
        }

        let mut streams: Vec<ContentStream> = Vec::new();
        let mut generated: Vec<String> = Vec::new();
        let mut forwarded = vec![false; files.len()];
        let mut pending = Vec::new();

        for token in tokens {
            if let Some(value) = payload.remove(&token) {
                let content = value.first().unwrap_or_default().to_string();
                streams.push(ContentStream::generated(&token, content));
                generated.push(token);
            } else if let Some(value) = form.first(&token) {
                streams.push(ContentStream::generated(&token, value.to_string()));
                generated.push(token);
            } else if files.iter().any(|f| f.field_name == token) {
                // every part sharing the name is forwarded
                for (idx, file) in files.iter().enumerate() {
                    if file.field_name == token {
                        streams.push(ContentStream::uploaded(file));
                        forwarded[idx] = true;
                    }
                }
            } else {
                pending.push(token);
            }
        }

        for token in pending {
            let bytes = self.resolve_remote(&token).await?;
            streams.push(ContentStream::generated(&token, bytes));
            generated.push(token);
        }

        for (file, done) in files.iter().zip(forwarded) {
            if !done && !generated.contains(&file.field_name) {
                streams.push(ContentStream::uploaded(file));
            }
        }

        if !streams.is_empty() {
            debug!(
                streams = ?streams.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                "Resolved content streams"
            );
        }

        Ok(streams)
    }

    async fn resolve_remote(&self, token: &str) -> RestResult<Vec<u8>> {
        let (prefix, value) = token.split_once('/').unwrap_or(("", token));

        if prefix == "library" {
            let harvest = harvest_library(
                self.client,
                &self.config.library_endpoint,
                value,
                &self.headers,
                self.config.biblib_max_rows,
            )
            .await
            .map_err(|e| unresolved(token, e))?;

            return harvest.to_csv().map_err(|e| RestError::InternalError {
                message: format!("Cannot render library {}: {}", harvest.library_id, e),
            });
        }

        info!(token, "Looking up saved query");
        let stream = fetch_saved_stream(self.client, &self.config.vault_endpoint, value, &self.headers)
            .await
            .map_err(|e| unresolved(token, e))?;
        Ok(stream.into_bytes())
    }
}
