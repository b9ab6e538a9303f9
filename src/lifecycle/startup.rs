//! Startup orchestration.
//!
//! Order: agent → metrics exporter → shared client and router → signal
//! handlers → listener.
//! Any failure is fatal and happens before the listener is bound, so a
//! misconfigured process never accepts a connection.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::apm::{Agent, AgentError};
use crate::config::ServiceConfig;
use crate::http::HttpServer;
use crate::lifecycle::signals::ShutdownSignals;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Fatal errors that stop the process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot build APM agent: {0}")]
    Agent(#[from] AgentError),

    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("cannot start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Initialize every subsystem and serve until SIGINT/SIGTERM.
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    let agent = Agent::new(&config.apm)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(&config, agent)?;
    let signals = ShutdownSignals::install().map_err(StartupError::Signals)?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals.recv().await;
        shutdown.trigger();
    });

    server
        .run(listener, server_shutdown)
        .await
        .map_err(StartupError::Serve)
}
