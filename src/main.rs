//! relay-proxy: CORS-friendly forwarding proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request                    ┌──────────────────────────────────────────┐
//!     ──────────────────────────────────┼─▶ cors middleware                        │
//!       /proxy?target=<url>             │     OPTIONS ──▶ 204 (answered here)      │
//!                                       │        │                                 │
//!                                       │        ▼                                 │
//!                                       │   target validator ──▶ 400 on bad input  │
//!                                       │        │                                 │
//!                                       │        ▼                                 │
//!                                       │   forwarder ──────────────────────────────┼──▶ Upstream
//!     Client Response                   │        │  (no Host/Authorization)        │
//!     ◀─────────────────────────────────┼── relay stream ◀──────────────────────────┼─── (no Set-Cookie)
//!                                       └──────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use relay_proxy::config::load_config;
use relay_proxy::lifecycle::{spawn_signal_handler, Shutdown};
use relay_proxy::observability::{init_logging, init_metrics};
use relay_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Forward /proxy?target=<url> requests with CORS headers", long_about = None)]
struct Cli {
    /// Optional TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port; overrides the config file and PORT.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.port)?;

    init_logging(&config.observability);
    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        redirect = ?config.upstream.redirect,
        dispatch_timeout_secs = config.upstream.dispatch_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Server listening");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
