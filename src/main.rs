//! Smart API Gateway
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ classifier ──▶ registry candidates
//!                                                        │
//!                                                        ▼
//!                                               rank by health score
//!                                                        │
//!                                                        ▼
//!     Client Response                     circuit gate ──▶ forwarder ──▶ Backend
//!     ◀────────────── http server ◀──── success / failover to next candidate
//!
//!     Cross-cutting: config, shared cache, metrics sweeper, observability,
//!                    lifecycle (startup / signals / shutdown)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use smart_gateway::config::load_or_default;
use smart_gateway::http::{AppState, GatewayServer};
use smart_gateway::lifecycle::{assemble, signals, Collaborators, Shutdown};
use smart_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "smart-gateway")]
#[command(about = "Classification-driven API gateway with health-ranked failover", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "smart-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        instances = config.instances.len(),
        cache = ?config.cache.provider,
        forward_timeout_ms = config.timeouts.forward_ms,
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

    let parts = Collaborators::from_config(&config).await?;
    let assembly = assemble(&config, parts).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    let sweeper = tokio::spawn(assembly.sweeper.run(shutdown.subscribe()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(AppState::new(assembly.gateway, &config), &config);
    server.run(listener, shutdown.clone()).await?;

    // Server exits on its own only when shutdown fired; make sure the sweeper hears it.
    shutdown.trigger();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Metrics sweeper task ended abnormally");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
