//! Slug gateway
//!
//! A single-hop authenticated reverse proxy built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                      GATEWAY                          │
//!                        │                                                       │
//!     Client Request     │  ┌────────┐  ┌──────┐  ┌───────┐  ┌───────────────┐   │
//!     ───────────────────┼─▶│  CORS  │─▶│ auth │─▶│ quota │─▶│ routing table │   │
//!                        │  └────────┘  └──────┘  └───────┘  └──────┬────────┘   │
//!                        │                                          │            │
//!                        │                                          ▼            │
//!                        │                                  ┌───────────────┐    │
//!                        │                                  │ path rewrite  │    │
//!                        │                                  └──────┬────────┘    │
//!                        │                                         ▼             │
//!     Client Response    │  ┌──────────────┐            ┌──────────────────┐     │
//!     ◀──────────────────┼──│ header relay │◀───────────│ forwarder (+TTL) │◀────┼──── Upstream
//!                        │  └──────────────┘            └──────────────────┘     │
//!                        │                                                       │
//!                        │  config · observability · security headers · lifecycle│
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use slug_gateway::config::CliArgs;
use slug_gateway::lifecycle::shutdown_signal;
use slug_gateway::observability::{logging, metrics};
use slug_gateway::{HttpServer, Shutdown};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match CliArgs::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: slug_gateway::GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        timeout_ms = config.timeouts.upstream_ms,
        rate_limit_points = config.rate_limit.points,
        rate_limit_window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    if let Some(raw) = &config.observability.metrics_address {
        let addr: SocketAddr = raw.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;
    Ok(())
}
