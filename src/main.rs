//! mitm-relay
//!
//! Man-in-the-middle relay between a browser game client and its server.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                  MITM RELAY                   │
//!                         │                                               │
//!   Game client ──────────┼─▶ http::server (classify)                     │
//!                         │      ├─ upgrade /aux ─▶ terminal::bridge ─────┼──▶ local TCP terminal
//!                         │      ├─ upgrade ──────▶ http::websocket ──────┼──▶ game server (WS)
//!                         │      │                     └─▶ capture         │
//!                         │      ├─ asset ────────▶ local file            │
//!                         │      └─ other ────────▶ forward + rewrite ────┼──▶ game server (HTTP)
//!                         │                                               │
//!                         │  config · lifecycle · observability · net     │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mitm_relay::config::{load_config, RelayConfig};
use mitm_relay::lifecycle::{signals, Shutdown};
use mitm_relay::observability::{logging, metrics};
use mitm_relay::HttpServer;

#[derive(Parser)]
#[command(name = "mitm-relay")]
#[command(about = "Man-in-the-middle relay for the game client", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when absent
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("mitm-relay v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.origin,
        terminal = %config.terminal.address,
        capture = config.capture.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    let server = HttpServer::new(&config)?;
    server.run(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
