//! Parameter normalization, clamping and allow-listing.
//!
//! Every request passes through [`ParameterSanitizer::normalize`] before any
//! other processing. It never fails: values that cannot be parsed fall back
//! to their defaults and unknown tokens are dropped silently.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::payload::{ParamValue, RequestPayload};

/// Header forwarded to the backend for request correlation.
pub const TRACE_ID_HEADER: &str = "X-Amzn-Trace-Id";

/// Value reported when the client sent no trace id.
pub const TRACE_ID_PLACEHOLDER: &str = "Root=-";

/// Parameter echoing the logging headers back through the backend.
pub const INTERNAL_LOGGING_PARAM: &str = "internal_logging_params";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Fields stripped from one field-list parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedFields {
    /// The field-list key (`fl` or `<prefix>.fl`).
    pub key: String,
    /// Lower-case deny-listed fields the client asked for.
    pub fields: Vec<String>,
}

/// Result of normalizing a payload.
#[derive(Debug, Clone)]
pub struct Sanitized {
    /// Headers for the outbound backend request.
    pub headers: HeaderMap,
    /// Deny-listed fields removed from each field-list key.
    pub restricted: Vec<RestrictedFields>,
}

/// Applies the configured limits and allow-lists to a payload.
pub struct ParameterSanitizer<'a> {
    config: &'a GatewayConfig,
}

impl<'a> ParameterSanitizer<'a> {
    /// Creates a sanitizer bound to a configuration.
    pub fn new(config: &'a GatewayConfig) -> Self {
        Self { config }
    }

    /// Normalizes `payload` in place and builds the outbound headers.
    pub fn normalize(
        &self,
        payload: &mut RequestPayload,
        inbound: &HeaderMap,
        backend_url: &str,
    ) -> Sanitized {
        let headers = self.outbound_headers(payload, inbound, backend_url);

        payload.set("wt", "json");

        if !payload.contains_key("rows") {
            payload.set("rows", self.config.default_rows);
        }

        let start = payload
            .first("start")
            .map(|v| parse_int(v, 0))
            .unwrap_or(0)
            .max(0);
        payload.set("start", start);

        if !payload.contains_key("fl") {
            payload.set("fl", "id");
        }

        if !payload.contains_key("cursorMark")
            && let Some(ms) = self.config.time_allowed_ms
        {
            payload.set("timeAllowed", ms.to_string());
        }

        if payload.contains_key("hl") && !payload.contains_key("hl.maxHighlightCharacters") {
            payload.set("hl.maxHighlightCharacters", self.config.max_fragsize);
        }

        let mut restricted = Vec::new();
        let row_keys = payload.keys_matching("rows");
        let field_list_keys: Vec<String> = payload
            .keys_matching("fl")
            .into_iter()
            .filter(|k| k != "hl.fl")
            .collect();

        for key in payload.keys() {
            if key.contains("hl.") {
                if key.ends_with(".snippets") {
                    let max = self.config.max_snippets;
                    self.clamp(payload, &key, max, 0, max);
                } else if key.ends_with(".fragsize") {
                    let max = self.config.max_fragsize;
                    let value = self.clamp(payload, &key, max, 1, max);
                    payload.set("hl.maxHighlightCharacters", value);
                }
            }

            match key.as_str() {
                "hl.fl" => self.allow_list(payload, &key, &self.config.allowed_highlight_fields),
                "facet.field" => self.allow_list(payload, &key, &self.config.allowed_facet_fields),
                "facet.pivot" => self.allow_list(payload, &key, &self.config.allowed_facet_pivot),
                "stats.field" => self.allow_list(payload, &key, &self.config.allowed_stats_fields),
                "sort" => self.sort(payload),
                _ => {}
            }

            if field_list_keys.contains(&key) {
                let removed = self.field_list(payload, &key);
                if !removed.is_empty() {
                    restricted.push(RestrictedFields {
                        key: key.clone(),
                        fields: removed,
                    });
                }
            }

            if row_keys.contains(&key) {
                let default = self.config.default_rows;
                self.clamp(payload, &key, default, 0, self.config.max_rows);
            }
        }

        debug!(params = payload.len(), restricted = restricted.len(), "Normalized request parameters");

        Sanitized {
            headers,
            restricted,
        }
    }

    fn outbound_headers(
        &self,
        payload: &mut RequestPayload,
        inbound: &HeaderMap,
        backend_url: &str,
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let content_type = inbound
            .get(header::CONTENT_TYPE)
            .filter(|v| v.to_str().is_ok_and(|s| s.contains("big-query")))
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(FORM_URLENCODED));
        headers.insert(header::CONTENT_TYPE, content_type);

        if let Some(host) = authority(backend_url)
            && let Ok(value) = HeaderValue::from_str(&host)
        {
            headers.insert(header::HOST, value);
        }

        let trace = HeaderName::from_static("x-amzn-trace-id");
        let logged = match inbound.get(&trace) {
            Some(value) => {
                headers.insert(trace.clone(), value.clone());
                value.to_str().unwrap_or(TRACE_ID_PLACEHOLDER).to_string()
            }
            None => TRACE_ID_PLACEHOLDER.to_string(),
        };
        payload.set(
            INTERNAL_LOGGING_PARAM,
            format!("{}={}", TRACE_ID_HEADER, logged),
        );

        headers
    }

    /// Clamps an integer parameter to `[lo, hi]`, storing a single value.
    fn clamp(&self, payload: &mut RequestPayload, key: &str, default: i64, lo: i64, hi: i64) -> i64 {
        let value = payload
            .first(key)
            .map(|v| parse_int(v, default))
            .unwrap_or(default)
            .min(hi)
            .max(lo);
        payload.set(key, value);
        value
    }

    fn field_list(&self, payload: &mut RequestPayload, key: &str) -> Vec<String> {
        let Some(value) = payload.get(key) else {
            return Vec::new();
        };
        let requested = split_fields(value);

        let (restricted, mut fields): (Vec<String>, Vec<String>) = requested
            .into_iter()
            .partition(|f| self.config.disallowed_fields.contains(f));

        let wildcard = fields.iter().any(|f| f == "*");
        fields.retain(|f| f != "*");

        let fields = if !fields.is_empty() {
            fields
        } else if wildcard && !self.config.allowed_fields.is_empty() {
            self.config.allowed_fields.clone()
        } else {
            vec!["id".to_string()]
        };

        payload.set(key, fields.join(","));
        restricted
    }

    fn allow_list(&self, payload: &mut RequestPayload, key: &str, allowed: &[String]) {
        let Some(value) = payload.get(key) else {
            return;
        };
        let was_multi = value.is_multi();

        let mut kept: Vec<String> = value
            .values()
            .iter()
            .filter_map(|v| {
                let tokens: Vec<String> = v
                    .split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .filter(|t| allowed.is_empty() || allowed.contains(t))
                    .collect();
                (!tokens.is_empty()).then(|| tokens.join(","))
            })
            .collect();

        match kept.len() {
            0 => {
                payload.remove(key);
            }
            1 if !was_multi => payload.set(key, kept.remove(0)),
            _ => payload.set(key, ParamValue::Multi(kept)),
        }
    }

    fn sort(&self, payload: &mut RequestPayload) {
        let Some(value) = payload.get("sort") else {
            return;
        };
        let allowed = &self.config.allowed_sort_fields;
        let first = split_fields(value)
            .into_iter()
            .find(|clause| allowed.is_empty() || allowed.contains(clause));

        match first {
            Some(clause) => payload.set("sort", clause),
            None => {
                payload.remove("sort");
            }
        }
    }
}

/// Splits comma-separated values into trimmed, lower-case, unique tokens.
fn split_fields(value: &ParamValue) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in value
        .values()
        .iter()
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_lowercase())
    {
        if !token.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Lenient integer parse used for every numeric parameter.
pub fn parse_int(value: &str, default: i64) -> i64 {
    value.trim().parse().unwrap_or(default)
}

/// Returns `host[:port]` of a URL.
pub fn authority(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
