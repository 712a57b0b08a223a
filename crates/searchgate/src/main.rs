//! searchgate
//!
//! Policy-enforcing gateway in front of a Solr search backend.

use clap::Parser;
use searchgate_rest::{GatewayConfig, create_app_with_config, init_logging};
use tracing::info;

#[cfg(feature = "sqlite")]
use searchgate_persistence::backends::sqlite::SqliteLimitStore;

/// Opens the SQLite rule store named by the configuration.
#[cfg(feature = "sqlite")]
fn open_rule_store(config: &GatewayConfig) -> anyhow::Result<SqliteLimitStore> {
    let db_path = config.database_url.as_deref().unwrap_or("limits.db");
    info!(database = %db_path, "Opening rule store");

    let store = if db_path == ":memory:" {
        SqliteLimitStore::in_memory()?
    } else {
        SqliteLimitStore::open(db_path)?
    };
    store.init_schema()?;

    Ok(store)
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &GatewayConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        solr_url = %config.solr_url,
        bot_pool = config.bot_solr_url.is_some(),
        "Starting searchgate"
    );

    start(config).await
}

#[cfg(feature = "sqlite")]
async fn start(config: GatewayConfig) -> anyhow::Result<()> {
    let store = open_rule_store(&config)?;
    let app = create_app_with_config(store, config.clone());
    serve(app, &config).await
}

/// Fallback when sqlite feature is not enabled.
#[cfg(not(feature = "sqlite"))]
async fn start(_config: GatewayConfig) -> anyhow::Result<()> {
    anyhow::bail!(
        "The rule store requires the 'sqlite' feature. \
         Build with: cargo build -p searchgate --features sqlite"
    )
}
