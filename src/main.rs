//! Fallback Gateway
//!
//! Serves a handful of content routes locally and forwards everything else,
//! unchanged, to a fixed upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ local route table ──▶ content handlers ──▶ content store
//!                     (request id,         │ (first match       (validate, fetch    (HTTP GET,
//!                      tracing)            │  wins)              under retry)        retry/backoff)
//!                                          │
//!                                          └─ unmatched ──▶ forwarding proxy ──▶ upstream
//!                                                           (header filtering,
//!                                                            502/504/500 mapping)
//! ```

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tokio::net::TcpListener;

use fallback_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use fallback_gateway::http::HttpServer;
use fallback_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use fallback_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "fallback-gateway", version)]
#[command(about = "HTTP gateway with local content routes and an upstream fallback", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `upstream.base_url`
    #[arg(short, long)]
    upstream: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(upstream) = &cli.upstream {
        config.upstream.base_url = upstream.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fallback-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        content_root = %config.content.root_url,
        retry_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
