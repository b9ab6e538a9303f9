//! telemetry-relay
//!
//! A small instrumented web server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ axum Router ──▶ apm::instrument ──▶ handler ──▶ response
//!                               (transaction)        │
//!                                                    ├──▶ InstrumentedClient ──▶ fetch target
//!                                                    │      (external segment, traceparent)
//!                                                    └──▶ LogRelay ──▶ log-ingestion API
//!                                                           [{"logs":[record]}]
//! ```
//!
//! Startup fails fast, before binding, when `APM_LICENSE_KEY` is unset.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use telemetry_relay::config::{load_config, ConfigOverrides, ObservabilityConfig};
use telemetry_relay::lifecycle::startup;
use telemetry_relay::observability::logging;

#[derive(Parser)]
#[command(name = "telemetry-relay")]
#[command(about = "Instrumented demo server that relays structured logs", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address (e.g. 127.0.0.1:8000).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        bind_address: cli.bind,
    };
    let loaded = load_config(cli.config.as_deref(), &overrides);

    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_else(|_| ObservabilityConfig::default());
    logging::init_logging(&observability);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Startup aborted");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        app_name = %config.apm.app_name,
        fetch_url = %config.fetch.url,
        relay_endpoint = %config.relay.endpoint,
        "telemetry-relay starting"
    );

    match startup::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
