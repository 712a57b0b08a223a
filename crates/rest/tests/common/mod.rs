//! Gateway test infrastructure.
//!
//! [`MockUpstream`] stands in for every service the gateway talks to: the
//! search backend (regular and bot pools), the saved-query service and the
//! library service. It records each request so tests can assert on what the
//! gateway actually forwarded.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_test::TestServer;
use searchgate_persistence::backends::sqlite::SqliteLimitStore;
use searchgate_rest::{GatewayConfig, create_app_with_config};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;

/// Bearer token the test configuration treats as a bot.
pub const BOT_TOKEN: &str = "bot-token";

/// Query that makes the mock backend answer `400 Bad Request`.
pub const FAILING_QUERY: &str = "__fail__";

/// Identifier the mock backend resolves to [`RESOLVED_BIBCODE`].
pub const KNOWN_IDENTIFIER: &str = "arXiv:1234";

/// Bibcode returned for [`KNOWN_IDENTIFIER`].
pub const RESOLVED_BIBCODE: &str = "2020ApJ...900..1A";

/// Contents of the `bigquery` field of saved query `qid1`.
pub const SAVED_STREAM: &str = "bibcode\n2019MNRAS.1..1B\n";

/// Cookie the mock backend sets on every search response.
pub const BACKEND_COOKIE: &str = "sroute=node-1; Path=/";

/// A request received by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// True for a multipart body.
    pub fn is_multipart(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.starts_with("multipart/form-data"))
    }

    /// Parameters from the query string, then from a form body.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = url::form_urlencoded::parse(self.query.as_bytes())
            .into_owned()
            .collect();
        if !self.is_multipart() {
            params.extend(url::form_urlencoded::parse(&self.body).into_owned());
        }
        params
    }

    /// First value of a parameter.
    pub fn param(&self, name: &str) -> Option<String> {
        self.params()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Every value of a parameter, in order.
    pub fn param_values(&self, name: &str) -> Vec<String> {
        self.params()
            .into_iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

type Recorder = Arc<Mutex<Vec<RecordedRequest>>>;

/// In-process stand-in for the backend and supporting services.
///
/// Routes served:
///
/// - `/solr/*`, `/bots/*` - search backend; echoes the parameters it got
/// - `/vault/query/qid1` - saved query with a `bigquery` stream
/// - `/vault/query/qid2` - saved query without any stream
/// - `/biblib/libraries/abc` - five documents
/// - `/biblib/libraries/dup` - the same page forever, with an inflated size
///
/// Anything else is `404 Not Found`.
pub struct MockUpstream {
    pub base_url: String,
    requests: Recorder,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let requests: Recorder = Arc::default();
        let app = Router::new()
            .fallback(record_and_respond)
            .with_state(requests.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener
            .local_addr()
            .expect("Mock upstream has no local address");
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock upstream stopped");
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("recorder poisoned").clone()
    }

    /// Requests received on `path`.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// The most recent request on `path`.
    pub fn last_to(&self, path: &str) -> RecordedRequest {
        self.requests_to(path)
            .pop()
            .unwrap_or_else(|| panic!("No request was sent to {}", path))
    }
}

async fn record_and_respond(State(requests): State<Recorder>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    let recorded = RecordedRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        headers: parts.headers,
        body,
    };

    let response = route(&recorded);
    requests.lock().expect("recorder poisoned").push(recorded);
    response
}

fn route(request: &RecordedRequest) -> Response {
    let path = request.path.as_str();
    if let Some(qid) = path.strip_prefix("/vault/query/") {
        return saved_query(qid);
    }
    if let Some(id) = path.strip_prefix("/biblib/libraries/") {
        return library_page(id, request);
    }
    if path.starts_with("/solr/") || path.starts_with("/bots/") {
        return search(request);
    }
    StatusCode::NOT_FOUND.into_response()
}

fn search(request: &RecordedRequest) -> Response {
    let q = request.param("q").unwrap_or_default();

    if q == FAILING_QUERY {
        let body = json!({
            "responseHeader": {"status": 400},
            "error": {"msg": "undefined field __fail__", "code": 400}
        });
        return solr_response(StatusCode::BAD_REQUEST, body);
    }

    if request.param("fl").as_deref() == Some("bibcode") && q.starts_with("identifier:") {
        let docs = if q.contains(KNOWN_IDENTIFIER) {
            vec![json!({"bibcode": RESOLVED_BIBCODE})]
        } else {
            Vec::new()
        };
        let body = json!({
            "responseHeader": {"status": 0},
            "response": {"numFound": docs.len(), "start": 0, "docs": docs}
        });
        return solr_response(StatusCode::OK, body);
    }

    if request.param("hl").is_some() {
        let body = json!({
            "responseHeader": {"status": 0},
            "response": {"numFound": 2, "start": 0, "docs": [
                {"id": "1", "publisher": "IEEE"},
                {"id": "2", "publisher": "Springer"}
            ]},
            "highlighting": {
                "1": {"abstract": ["a <em>star</em>"], "body": ["the <em>star</em>"]},
                "2": {"abstract": ["another <em>star</em>"], "body": ["more <em>star</em>"]}
            }
        });
        return solr_response(StatusCode::OK, body);
    }

    let mut params = Map::new();
    for (key, value) in request.params() {
        match params.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            _ => {
                params.insert(key, json!([value]));
            }
        }
    }
    let body = json!({
        "responseHeader": {"status": 0, "params": params},
        "response": {"numFound": 0, "start": 0, "docs": []}
    });
    solr_response(StatusCode::OK, body)
}

fn solr_response(status: StatusCode, body: Value) -> Response {
    let mut response = (status, body.to_string()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(header::SET_COOKIE, HeaderValue::from_static(BACKEND_COOKIE));
    response
}

fn saved_query(qid: &str) -> Response {
    let stored = match qid {
        "qid1" => json!({"query": "q=star&fq=%7B!bitset%7D", "bigquery": SAVED_STREAM}),
        "qid2" => json!({"query": "q=star"}),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    axum::Json(json!({"qid": qid, "numfound": 1, "query": stored.to_string()})).into_response()
}

fn library_page(id: &str, request: &RecordedRequest) -> Response {
    let rows: usize = request
        .param("rows")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);
    let start: usize = request
        .param("start")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let (documents, total): (Vec<String>, usize) = match id {
        "abc" => {
            let all: Vec<String> = (1..=5).map(|i| format!("2020ABC...{}", i)).collect();
            let page = all.iter().skip(start).take(rows).cloned().collect();
            (page, all.len())
        }
        "dup" => (vec!["DUP1".to_string(), "DUP2".to_string()], 10),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    axum::Json(json!({
        "documents": documents,
        "metadata": {"id": id, "num_documents": total}
    }))
    .into_response()
}

/// Gateway configuration pointing every upstream at `upstream`.
pub fn gateway_config(upstream: &MockUpstream) -> GatewayConfig {
    GatewayConfig {
        solr_url: format!("{}/solr", upstream.base_url),
        bot_solr_url: Some(format!("{}/bots", upstream.base_url)),
        vault_endpoint: format!("{}/vault/query", upstream.base_url),
        library_endpoint: format!("{}/biblib/libraries", upstream.base_url),
        bot_tokens: vec![BOT_TOKEN.to_string()],
        ..GatewayConfig::for_testing()
    }
}

/// An empty, initialized in-memory rule store.
pub fn rule_store() -> SqliteLimitStore {
    let store = SqliteLimitStore::in_memory().expect("Failed to create rule store");
    store.init_schema().expect("Failed to initialize rule store");
    store
}

/// A gateway under test together with its mock upstream.
pub struct TestGateway {
    pub server: TestServer,
    pub upstream: MockUpstream,
}

impl TestGateway {
    pub async fn new() -> Self {
        Self::build(rule_store(), |_| {}).await
    }

    pub async fn with_store(store: SqliteLimitStore) -> Self {
        Self::build(store, |_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut GatewayConfig)) -> Self {
        Self::build(rule_store(), customize).await
    }

    async fn build(store: SqliteLimitStore, customize: impl FnOnce(&mut GatewayConfig)) -> Self {
        let upstream = MockUpstream::start().await;
        let mut config = gateway_config(&upstream);
        customize(&mut config);

        let app = create_app_with_config(store, config);
        let server = TestServer::new(app).expect("Failed to create test server");

        Self { server, upstream }
    }
}
