//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): inbound requests by method, route, status
//! - `http_request_duration_seconds` (histogram): inbound latency
//! - `apm_transactions_total` (counter): ended transactions by method and route
//! - `apm_transaction_duration_seconds` (histogram)
//! - `relay_posts_total` (counter): ingestion responses by status
//! - `relay_failures_total` (counter): relay errors by kind
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// `route` is the matched route template, never the raw request path.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_transaction(name: &str, elapsed: Duration) {
    let labels = [("transaction", name.to_string())];
    metrics::counter!("apm_transactions_total", &labels).increment(1);
    metrics::histogram!("apm_transaction_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

pub fn record_relay_post(status: u16) {
    metrics::counter!("relay_posts_total", "status" => status.to_string()).increment(1);
}

pub fn record_relay_failure(kind: &'static str) {
    metrics::counter!("relay_failures_total", "kind" => kind).increment(1);
}
