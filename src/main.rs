//! Account service entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                  GATEHOUSE                    │
//!                      │                                               │
//!   Client Request     │  ┌─────────┐   ┌──────────────────────────┐  │
//!   ──────────────────▶│  │  http   │──▶│      guard chain          │  │
//!                      │  │ server  │   │ body size → ip rate → pow │  │
//!                      │  └─────────┘   └────────────┬─────────────┘  │
//!                      │                              │                │
//!                      │                              ▼                │
//!                      │                     ┌──────────────┐         │
//!                      │                     │   accounts    │         │
//!                      │                     │ register/login│         │
//!                      │                     │ sessions      │         │
//!                      │                     └──────┬───────┘         │
//!                      │                            │                  │
//!   Client Response    │  ┌─────────┐        ┌─────▼──────┐           │
//!   ◀──────────────────│──│response │◀───────│  db store  │           │
//!                      │  │envelope │        │  (SQLite)  │           │
//!                      │  └─────────┘        └────────────┘           │
//!                      │                                               │
//!                      │  Cross-cutting: config · observability ·      │
//!                      │  lifecycle (graceful shutdown)                │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::Path;

use tokio::net::TcpListener;

use gatehouse::config::{load_config, Config};
use gatehouse::db::Store;
use gatehouse::http::HttpServer;
use gatehouse::lifecycle::Shutdown;
use gatehouse::observability;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config comes first; everything else (including the logger) depends on it.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        load_config(Path::new(&config_path))?
    } else {
        Config::default()
    };

    observability::init_logging(config.observability.debug);
    tracing::info!(config = %config_path, debug = config.observability.debug, "gatehouse starting");
    if !config_found {
        tracing::warn!(config = %config_path, "Config file not found, using defaults");
    }

    // Database and migrations.
    let store = Store::connect(&config.database.path).await?;
    store.migrate().await?;
    tracing::info!(path = %config.database.path, "Database ready");

    // Metrics endpoint (optional).
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Guards and routes are built from the validated config.
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, store)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
