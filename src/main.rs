//! API Gateway
//!
//! A path-prefix gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     API GATEWAY                      │
//!                      │                                                      │
//!     Client Request   │  ┌─────────┐    ┌────────────┐    ┌──────────────┐   │
//!     ─────────────────┼─▶│  http   │───▶│ middleware │───▶│    proxy     │   │
//!                      │  │ server  │    │   chain    │    │   handler    │   │
//!                      │  └─────────┘    └────────────┘    └──────┬───────┘   │
//!                      │                                          │           │
//!                      │                 ┌──────────────┐         │           │
//!                      │                 │   routing    │◀────────┤           │
//!                      │                 │ route table  │         │           │
//!                      │                 └──────────────┘         ▼           │
//!     Client Response  │  ┌─────────┐                      ┌──────────────┐   │
//!     ◀────────────────┼──│response │◀─────────────────────│   request    │───┼──▶ Backend
//!                      │  │  relay  │◀─────────────────────│ transformer  │◀──┼─── Server
//!                      │  └─────────┘                      └──────────────┘   │
//!                      │                                                      │
//!                      │  ┌────────────────────────────────────────────────┐  │
//!                      │  │            Cross-Cutting Concerns              │  │
//!                      │  │   config  ·  observability  ·  lifecycle       │  │
//!                      │  └────────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::load_config;
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::{build_route_table, Shutdown};
use api_gateway::observability::{self, logging, metrics};

/// Path-prefix API gateway.
#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_logging(&config.telemetry.log_level)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "api-gateway starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        telemetry_enabled = config.telemetry.enabled,
        "Configuration loaded"
    );

    let routes = match build_route_table(&config.routes) {
        Ok(routes) => routes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build route table");
            return Err(e.into());
        }
    };

    if config.telemetry.enabled && config.telemetry.metrics_enabled {
        let addr: SocketAddr = config.telemetry.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let telemetry = observability::from_config(&config.telemetry);
    let server = HttpServer::from_config(&config, routes, telemetry)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    let signal_task = shutdown.trigger_on_signal();
    server.run(listener, shutdown_rx).await?;
    signal_task.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
