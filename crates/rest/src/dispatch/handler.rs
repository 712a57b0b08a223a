//! Backend handler selection.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};

use crate::config::GatewayConfig;

/// Header a front end uses to pass the original caller's credentials.
pub const FORWARDED_AUTHORIZATION: &str = "x-forwarded-authorization";

const BEARER_PREFIX_LEN: usize = "Bearer ".len();

/// Which backend handler a request goes to.
///
/// Requests are split by caller (regular or bot) and by whether content
/// streams are attached (those must reach a bulk-capable handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerVariant {
    /// Regular caller, no streams.
    Default,
    /// Bot caller, no streams.
    Bot,
    /// Regular caller with content streams.
    DefaultEmbeddedBigquery,
    /// Bot caller with content streams.
    BotEmbeddedBigquery,
}

impl HandlerVariant {
    /// Variant for a caller.
    pub fn for_caller(is_bot: bool) -> Self {
        if is_bot {
            HandlerVariant::Bot
        } else {
            HandlerVariant::Default
        }
    }

    /// The same caller class, routed to the bulk handler.
    pub fn with_streams(self) -> Self {
        match self {
            HandlerVariant::Default | HandlerVariant::DefaultEmbeddedBigquery => {
                HandlerVariant::DefaultEmbeddedBigquery
            }
            HandlerVariant::Bot | HandlerVariant::BotEmbeddedBigquery => {
                HandlerVariant::BotEmbeddedBigquery
            }
        }
    }

    /// Returns true for bot callers.
    pub fn is_bot(self) -> bool {
        matches!(
            self,
            HandlerVariant::Bot | HandlerVariant::BotEmbeddedBigquery
        )
    }

    /// Returns the variant's name as used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerVariant::Default => "default",
            HandlerVariant::Bot => "bot",
            HandlerVariant::DefaultEmbeddedBigquery => "default_embedded_bigquery",
            HandlerVariant::BotEmbeddedBigquery => "bot_embedded_bigquery",
        }
    }
}

/// Variant-to-URL table of one endpoint.
///
/// Variants without an entry use the `Default` URL.
#[derive(Debug, Clone)]
pub struct HandlerSelector {
    handlers: HashMap<HandlerVariant, String>,
}

impl HandlerSelector {
    /// Creates a table with only the default handler.
    pub fn new(default: impl Into<String>) -> Self {
        let mut handlers = HashMap::new();
        handlers.insert(HandlerVariant::Default, default.into());
        Self { handlers }
    }

    /// Adds a handler for a variant.
    pub fn with(mut self, variant: HandlerVariant, url: impl Into<String>) -> Self {
        self.handlers.insert(variant, url.into());
        self
    }

    /// Returns the URL for a variant.
    pub fn get(&self, variant: HandlerVariant) -> &str {
        self.handlers
            .get(&variant)
            .or_else(|| self.handlers.get(&HandlerVariant::Default))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Public search endpoints of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `/search/query`
    Search,
    /// `/search/tvrh`
    Tvrh,
    /// `/search/qtree`
    Qtree,
    /// `/search/bigquery`
    BigQuery,
}

impl Endpoint {
    /// Returns the endpoint name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Search => "query",
            Endpoint::Tvrh => "tvrh",
            Endpoint::Qtree => "qtree",
            Endpoint::BigQuery => "bigquery",
        }
    }

    /// Builds the endpoint's handler table.
    pub fn handlers(self, config: &GatewayConfig) -> HandlerSelector {
        match self {
            Endpoint::Search => HandlerSelector::new(config.search_handler())
                .with(HandlerVariant::DefaultEmbeddedBigquery, config.bigquery_handler())
                .with(HandlerVariant::Bot, config.bot_search_handler())
                .with(HandlerVariant::BotEmbeddedBigquery, config.bot_bigquery_handler()),
            Endpoint::Tvrh => HandlerSelector::new(config.tvrh_handler()),
            Endpoint::Qtree => HandlerSelector::new(config.qtree_handler()),
            Endpoint::BigQuery => HandlerSelector::new(config.bigquery_handler())
                .with(HandlerVariant::DefaultEmbeddedBigquery, config.bigquery_handler())
                .with(HandlerVariant::Bot, config.bot_bigquery_handler())
                .with(HandlerVariant::BotEmbeddedBigquery, config.bot_bigquery_handler()),
        }
    }

    /// Returns true if bot callers are routed separately.
    pub fn classifies_bots(self) -> bool {
        matches!(self, Endpoint::Search | Endpoint::BigQuery)
    }

    /// Returns true if citation queries are rewritten before dispatch.
    pub fn rewrites_queries(self) -> bool {
        matches!(self, Endpoint::Search | Endpoint::BigQuery)
    }
}

/// Returns the bearer token of the request.
///
/// `X-Forwarded-Authorization` wins over `Authorization` when it carries a
/// token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    fn token(value: Option<&axum::http::HeaderValue>) -> Option<&str> {
        value
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.get(BEARER_PREFIX_LEN..))
            .filter(|t| !t.is_empty())
    }

    token(headers.get(FORWARDED_AUTHORIZATION)).or_else(|| token(headers.get(header::AUTHORIZATION)))
}

/// Returns true if the request's token belongs to a configured bot.
pub fn is_bot(headers: &HeaderMap, bot_tokens: &[String]) -> bool {
    bearer_token(headers).is_some_and(|token| bot_tokens.iter().any(|b| b == token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_selector_falls_back_to_default() {
        let selector = HandlerSelector::new("http://solr/tvrh");
        assert_eq!(selector.get(HandlerVariant::BotEmbeddedBigquery), "http://solr/tvrh");
    }

    #[test]
    fn test_search_table() {
        let config = GatewayConfig {
            bot_solr_url: Some("http://bots/solr".to_string()),
            ..Default::default()
        };
        let table = Endpoint::Search.handlers(&config);
        assert_eq!(table.get(HandlerVariant::Default), "http://localhost:8983/solr/select");
        assert_eq!(
            table.get(HandlerVariant::DefaultEmbeddedBigquery),
            "http://localhost:8983/solr/bigquery"
        );
        assert_eq!(table.get(HandlerVariant::Bot), "http://bots/solr/select");
        assert_eq!(table.get(HandlerVariant::BotEmbeddedBigquery), "http://bots/solr/bigquery");
    }

    #[test]
    fn test_with_streams_keeps_caller_class() {
        assert_eq!(
            HandlerVariant::Bot.with_streams(),
            HandlerVariant::BotEmbeddedBigquery
        );
        assert_eq!(
            HandlerVariant::Default.with_streams(),
            HandlerVariant::DefaultEmbeddedBigquery
        );
    }

    #[test]
    fn test_bearer_token_prefers_forwarded_header() {
        let map = headers(&[
            ("authorization", "Bearer service"),
            ("x-forwarded-authorization", "Bearer caller"),
        ]);
        assert_eq!(bearer_token(&map), Some("caller"));

        let map = headers(&[("authorization", "Bearer service"), ("x-forwarded-authorization", "")]);
        assert_eq!(bearer_token(&map), Some("service"));

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_is_bot() {
        let tokens = vec!["bot-token".to_string()];
        assert!(is_bot(&headers(&[("authorization", "Bearer bot-token")]), &tokens));
        assert!(!is_bot(&headers(&[("authorization", "Bearer user-token")]), &tokens));
        assert!(!is_bot(&headers(&[("authorization", "Bearer ")]), &[String::new()]));
    }
}
