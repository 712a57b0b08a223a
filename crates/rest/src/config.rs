//! Gateway configuration.
//!
//! One [`GatewayConfig`] exists per running instance. It is parsed once at
//! startup (command line, then environment, then defaults) and shared
//! read-only with every request through [`AppState`](crate::AppState).
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SEARCHGATE_PORT` | 8080 | Server port |
//! | `SEARCHGATE_HOST` | 127.0.0.1 | Host to bind |
//! | `SEARCHGATE_LOG_LEVEL` | info | Log level |
//! | `SEARCHGATE_MAX_BODY_SIZE` | 104857600 | Max request body (bytes) |
//! | `SEARCHGATE_REQUEST_TIMEOUT` | 120 | Request timeout (seconds) |
//! | `SEARCHGATE_DATABASE_URL` | - | SQLite path of the rule store |
//! | `SOLR_SERVICE_URL` | http://localhost:8983/solr | Search backend base URL |
//! | `BOT_SOLR_SERVICE_URL` | `SOLR_SERVICE_URL` | Backend base URL for bots |
//! | `VAULT_ENDPOINT` | http://adsws/vault/query | Saved-query service |
//! | `LIBRARY_ENDPOINT` | http://adsws/biblib/libraries | Library service |
//! | `SOLR_SERVICE_MAX_ROWS` | 2000 | Upper bound for `rows` |
//! | `SOLR_SERVICE_DEFAULT_ROWS` | 10 | `rows` when absent or invalid |
//! | `BOT_TOKENS` | - | Comma-separated bearer tokens of bots |
//!
//! List-valued settings are comma-separated.
//!
//! # Example
//!
//! ```rust
//! use searchgate_rest::GatewayConfig;
//!
//! let config = GatewayConfig {
//!     port: 3000,
//!     max_rows: 100,
//!     ..Default::default()
//! };
//! assert_eq!(config.search_handler(), "http://localhost:8983/solr/select");
//! ```

use clap::Parser;

const DEFAULT_DISALLOWED_FIELDS: &str = "body,full,ack,readers,reader,email";

const DEFAULT_ALLOWED_FIELDS: &str = "abstract,ack,aff,alternate_bibcode,alternate_title,\
arxiv_class,author,bibcode,bibgroup,bibstem,citation_count,copyright,data,database,doctype,\
doi,first_author,grant,has,id,identifier,indexstamp,issue,keyword,lang,orcid_other,orcid_pub,\
orcid_user,page,property,pub,pubdate,read_count,title,vizier,volume,year";

const DEFAULT_FACET_FIELDS: &str = "bibstem_facet,author_facet_hier,property,keyword_facet,\
year,bibgroup_facet,data_facet,vizier_facet,grant_facet_hier,database,simbad_object_facet_hier,\
aff_facet_hier,doctype_facet_hier,first_author_facet_hier,ned_object_facet_hier";

const DEFAULT_FACET_PIVOT: &str = "property,year,citation_count,read_count";

const DEFAULT_STATS_FIELDS: &str = "citation_count,read_count,citation_count_norm";

const DEFAULT_HIGHLIGHT_FIELDS: &str = "title,abstract";

const DEFAULT_SORT_FIELDS: &str = "id asc,author_count asc,bibcode asc,citation_count asc,\
citation_count_norm asc,classic_factor asc,first_author asc,date asc,entry_date asc,\
read_count asc,score asc,id desc,author_count desc,bibcode desc,citation_count desc,\
citation_count_norm desc,classic_factor desc,first_author desc,date desc,entry_date desc,\
read_count desc,score desc";

/// Gateway configuration.
///
/// This struct can be constructed from environment variables using
/// [`GatewayConfig::from_env`], from command line arguments using
/// [`GatewayConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "searchgate")]
#[command(about = "Policy-enforcing gateway in front of a Solr search backend")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[arg(short, long, env = "SEARCHGATE_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "SEARCHGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "SEARCHGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "SEARCHGATE_MAX_BODY_SIZE", default_value = "104857600")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "SEARCHGATE_REQUEST_TIMEOUT", default_value = "120")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "SEARCHGATE_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "SEARCHGATE_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(long, env = "SEARCHGATE_CORS_METHODS", default_value = "GET,POST,OPTIONS")]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "SEARCHGATE_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept,X-Forwarded-Authorization"
    )]
    pub cors_headers: String,

    /// Path of the SQLite database holding field limits.
    #[arg(long, env = "SEARCHGATE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Base URL of the search backend.
    #[arg(long, env = "SOLR_SERVICE_URL", default_value = "http://localhost:8983/solr")]
    pub solr_url: String,

    /// Base URL of the backend pool serving bots (defaults to `solr_url`).
    #[arg(long, env = "BOT_SOLR_SERVICE_URL")]
    pub bot_solr_url: Option<String>,

    /// Saved-query service endpoint.
    #[arg(long, env = "VAULT_ENDPOINT", default_value = "http://adsws/vault/query")]
    pub vault_endpoint: String,

    /// Library service endpoint.
    #[arg(long, env = "LIBRARY_ENDPOINT", default_value = "http://adsws/biblib/libraries")]
    pub library_endpoint: String,

    /// Page size used when harvesting a library.
    #[arg(long, env = "BIBLIB_MAX_ROWS", default_value = "2000")]
    pub biblib_max_rows: usize,

    /// Rows returned when the request does not ask for a valid number.
    #[arg(long, env = "SOLR_SERVICE_DEFAULT_ROWS", default_value = "10")]
    pub default_rows: i64,

    /// Upper bound for `rows` and every `*.rows`.
    #[arg(long, env = "SOLR_SERVICE_MAX_ROWS", default_value = "2000")]
    pub max_rows: i64,

    /// Upper bound for highlight snippets.
    #[arg(long, env = "SOLR_SERVICE_MAX_SNIPPETS", default_value = "4")]
    pub max_snippets: i64,

    /// Upper bound for highlight fragment size.
    #[arg(long, env = "SOLR_SERVICE_MAX_FRAGSIZE", default_value = "200")]
    pub max_fragsize: i64,

    /// Time budget handed to the backend (`timeAllowed`), in milliseconds.
    #[arg(long, env = "SOLR_SERVICE_TIME_ALLOWED_MS")]
    pub time_allowed_ms: Option<u64>,

    /// Fields nobody may request unless granted by a field limit.
    #[arg(long, env = "SOLR_SERVICE_DISALLOWED_FIELDS", value_delimiter = ',', default_value = DEFAULT_DISALLOWED_FIELDS)]
    pub disallowed_fields: Vec<String>,

    /// Fields a wildcard field list expands to.
    #[arg(long, env = "SOLR_SERVICE_ALLOWED_FIELDS", value_delimiter = ',', default_value = DEFAULT_ALLOWED_FIELDS)]
    pub allowed_fields: Vec<String>,

    /// Allowed `facet.field` values.
    #[arg(long, env = "SOLR_SERVICE_ALLOWED_FACET_FIELDS", value_delimiter = ',', default_value = DEFAULT_FACET_FIELDS)]
    pub allowed_facet_fields: Vec<String>,

    /// Allowed `facet.pivot` values.
    #[arg(long, env = "SOLR_SERVICE_ALLOWED_FACET_PIVOT", value_delimiter = ',', default_value = DEFAULT_FACET_PIVOT)]
    pub allowed_facet_pivot: Vec<String>,

    /// Allowed `stats.field` values.
    #[arg(long, env = "SOLR_SERVICE_ALLOWED_STATS_FIELDS", value_delimiter = ',', default_value = DEFAULT_STATS_FIELDS)]
    pub allowed_stats_fields: Vec<String>,

    /// Allowed `hl.fl` values.
    #[arg(long, env = "SOLR_SERVICE_ALLOWED_HIGHLIGHTS_FIELDS", value_delimiter = ',', default_value = DEFAULT_HIGHLIGHT_FIELDS)]
    pub allowed_highlight_fields: Vec<String>,

    /// Allowed `sort` clauses (`field direction`).
    #[arg(long, env = "SOLR_SERVICE_ALLOWED_SORT_FIELDS", value_delimiter = ',', default_value = DEFAULT_SORT_FIELDS)]
    pub allowed_sort_fields: Vec<String>,

    /// Publishers whose documents may not carry full-text highlights.
    #[arg(long, env = "SOLR_SERVICE_DISALLOWED_HIGHLIGHTS_PUBLISHERS", value_delimiter = ',', default_value = "ieee")]
    pub disallowed_highlight_publishers: Vec<String>,

    /// Highlight keys stripped from documents of disallowed publishers.
    #[arg(long, env = "SOLR_SERVICE_UNHIGHLIGHTABLE_KEYS", value_delimiter = ',', default_value = "body,ack")]
    pub unhighlightable_keys: Vec<String>,

    /// Cookie names forwarded to the backend.
    #[arg(long, env = "SOLR_SERVICE_FORWARDED_COOKIES", value_delimiter = ',', default_value = "sroute")]
    pub forwarded_cookies: Vec<String>,

    /// Bearer tokens identifying automated callers.
    #[arg(long, env = "BOT_TOKENS", value_delimiter = ',')]
    pub bot_tokens: Vec<String>,

    /// Parameters merged into every request (url-encoded, e.g. `a=1&b=2`).
    #[arg(long, env = "SOLR_INJECT_QUERY_PARAMS")]
    pub inject_params: Option<String>,

    /// Accept at most one uploaded content stream per bulk request.
    #[arg(long, env = "SOLR_SERVICE_SINGLE_CONTENT_STREAM", default_value = "false")]
    pub single_content_stream: bool,

    /// Version string reported in the `Server` response header.
    #[arg(long, env = "SOLR_SERVICE_VERSION", default_value = "v4.10")]
    pub service_version: String,

    /// `Cache-Control` value for successful responses.
    #[arg(long, env = "SOLR_CACHE_CONTROL", default_value = "public, max-age=600")]
    pub cache_control: String,
}

fn list(csv: &str) -> Vec<String> {
    csv.split(',').map(|s| s.trim().to_string()).collect()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 100 * 1024 * 1024, // 100MB
            request_timeout: 120,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept,X-Forwarded-Authorization"
                .to_string(),
            database_url: None,
            solr_url: "http://localhost:8983/solr".to_string(),
            bot_solr_url: None,
            vault_endpoint: "http://adsws/vault/query".to_string(),
            library_endpoint: "http://adsws/biblib/libraries".to_string(),
            biblib_max_rows: 2000,
            default_rows: 10,
            max_rows: 2000,
            max_snippets: 4,
            max_fragsize: 200,
            time_allowed_ms: None,
            disallowed_fields: list(DEFAULT_DISALLOWED_FIELDS),
            allowed_fields: list(DEFAULT_ALLOWED_FIELDS),
            allowed_facet_fields: list(DEFAULT_FACET_FIELDS),
            allowed_facet_pivot: list(DEFAULT_FACET_PIVOT),
            allowed_stats_fields: list(DEFAULT_STATS_FIELDS),
            allowed_highlight_fields: list(DEFAULT_HIGHLIGHT_FIELDS),
            allowed_sort_fields: list(DEFAULT_SORT_FIELDS),
            disallowed_highlight_publishers: vec!["ieee".to_string()],
            unhighlightable_keys: vec!["body".to_string(), "ack".to_string()],
            forwarded_cookies: vec!["sroute".to_string()],
            bot_tokens: Vec::new(),
            inject_params: None,
            single_content_stream: false,
            service_version: "v4.10".to_string(),
            cache_control: "public, max-age=600".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Creates a new GatewayConfig from environment variables.
    pub fn from_env() -> Self {
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn solr_base(&self) -> &str {
        self.solr_url.trim_end_matches('/')
    }

    fn bot_solr_base(&self) -> &str {
        self.bot_solr_url
            .as_deref()
            .unwrap_or(&self.solr_url)
            .trim_end_matches('/')
    }

    /// Backend select handler.
    pub fn search_handler(&self) -> String {
        format!("{}/select", self.solr_base())
    }

    /// Backend term-vector handler.
    pub fn tvrh_handler(&self) -> String {
        format!("{}/tvrh", self.solr_base())
    }

    /// Backend query-tree handler.
    pub fn qtree_handler(&self) -> String {
        format!("{}/qtree", self.solr_base())
    }

    /// Backend bulk-query handler.
    pub fn bigquery_handler(&self) -> String {
        format!("{}/bigquery", self.solr_base())
    }

    /// Select handler of the bot pool.
    pub fn bot_search_handler(&self) -> String {
        format!("{}/select", self.bot_solr_base())
    }

    /// Bulk-query handler of the bot pool.
    pub fn bot_bigquery_handler(&self) -> String {
        format!("{}/bigquery", self.bot_solr_base())
    }

    /// Returns the configured injected parameters in order.
    pub fn injected_params(&self) -> Vec<(String, String)> {
        self.inject_params
            .as_deref()
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.max_rows < 0 {
            errors.push("Max rows cannot be negative".to_string());
        }

        if self.default_rows < 0 || self.default_rows > self.max_rows {
            errors.push("Default rows must lie between 0 and max rows".to_string());
        }

        if self.max_snippets < 0 {
            errors.push("Max snippets cannot be negative".to_string());
        }

        if self.max_fragsize < 1 {
            errors.push("Max fragsize must be at least 1".to_string());
        }

        if self.biblib_max_rows == 0 {
            errors.push("Library page size cannot be 0".to_string());
        }

        for (name, url) in [
            ("solr_url", Some(self.solr_url.as_str())),
            ("bot_solr_url", self.bot_solr_url.as_deref()),
            ("vault_endpoint", Some(self.vault_endpoint.as_str())),
            ("library_endpoint", Some(self.library_endpoint.as_str())),
        ] {
            if let Some(url) = url
                && url::Url::parse(url).is_err()
            {
                errors.push(format!("{} is not a valid URL: {}", name, url));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// This uses ephemeral port 0 and disables features that might interfere
    /// with tests.
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            log_level: "debug".to_string(),
            request_timeout: 5,
            enable_cors: false,
            biblib_max_rows: 2,
            ..Default::default()
        }
    }
}
