//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (instrumentation, timeout, tracing, panic catcher)
//! - Build the shared outbound client once and inject it into handlers
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::apm::{self, Agent};
use crate::config::ServiceConfig;
use crate::http::client::{build_http_client, InstrumentedClient};
use crate::http::handlers;
use crate::relay::LogRelay;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: InstrumentedClient,
    pub relay: LogRelay,
    pub fetch_url: Arc<str>,
    pub fetch_timeout: Duration,
}

impl AppState {
    /// Build handler state around one shared outbound client.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            Duration::from_secs(config.client.connect_timeout_secs),
            config.client.use_system_proxy,
        )?;

        Ok(Self {
            client: InstrumentedClient::new(client.clone()),
            relay: LogRelay::from_config(client, config),
            fetch_url: Arc::from(config.fetch.url.as_str()),
            fetch_timeout: Duration::from_secs(config.fetch.timeout_secs),
        })
    }
}

/// HTTP server for the telemetry relay.
pub struct HttpServer {
    router: Router,
    agent: Agent,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and agent.
    pub fn new(config: &ServiceConfig, agent: Agent) -> Result<Self, reqwest::Error> {
        let state = AppState::from_config(config)?;
        let router = Self::build_router(config, agent.clone(), state);
        Ok(Self { router, agent })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ServiceConfig, agent: Agent, state: AppState) -> Router {
        Router::new()
            .route("/", get(handlers::root))
            .route("/fetch", get(handlers::fetch))
            .with_state(state)
            .layer(middleware::from_fn_with_state(agent, apm::instrument))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "start server");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(
            finished_transactions = self.agent.finished_transactions(),
            "HTTP server stopped"
        );
        Ok(())
    }
}
