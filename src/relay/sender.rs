//! Log relay: ships one structured record per call to the ingestion API.

use std::time::Duration;

use axum::http::{header, StatusCode};
use thiserror::Error;

use crate::apm::RequestContext;
use crate::config::ServiceConfig;
use crate::observability::metrics;
use crate::relay::record::{build_record, encode_batch, now_millis, LogRecord};

/// Header carrying the ingestion API key.
pub const LICENSE_KEY_HEADER: &str = "x-license-key";

/// Errors from a single relay POST.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("cannot encode log batch: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot build request: {0}")]
    RequestBuild(#[source] reqwest::Error),

    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),
}

impl RelayError {
    fn kind(&self) -> &'static str {
        match self {
            RelayError::Serialization(_) => "serialization",
            RelayError::RequestBuild(_) => "request_build",
            RelayError::Transport(_) => "transport",
        }
    }
}

/// Best-effort log shipper. Holds no per-request state; clone freely.
#[derive(Debug, Clone)]
pub struct LogRelay {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl LogRelay {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &ServiceConfig) -> Self {
        Self::new(
            client,
            config.relay.endpoint.clone(),
            config.relay_api_key(),
            Duration::from_secs(config.relay.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ship `message` correlated with the context's transaction.
    ///
    /// Does nothing when the context has no transaction. Delivery failures
    /// are logged and swallowed.
    pub async fn log(&self, ctx: &RequestContext, message: &str) {
        let Some(txn) = ctx.transaction() else {
            return;
        };

        let record = build_record(&txn.linking_metadata(), now_millis(), message);
        if let Err(e) = self.send(&[record]).await {
            metrics::record_relay_failure(e.kind());
            tracing::warn!(
                error = %e,
                transaction = %txn.name(),
                endpoint = %self.endpoint,
                "Log relay failed"
            );
        }
    }

    /// POST `records` as one batch. Any HTTP status is a success from the
    /// relay's point of view and is returned to the caller.
    pub async fn send(&self, records: &[LogRecord]) -> Result<StatusCode, RelayError> {
        let body = encode_batch(records)?;

        let request = self
            .client
            .post(&self.endpoint)
            .header(LICENSE_KEY_HEADER, &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .build()
            .map_err(RelayError::RequestBuild)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(RelayError::Transport)?;

        let status = response.status();
        metrics::record_relay_post(status.as_u16());
        tracing::info!(status = status.as_u16(), "post log status={}", status.as_u16());

        // Drain so the pooled connection can be reused.
        let _ = response.bytes().await;

        Ok(status)
    }
}
