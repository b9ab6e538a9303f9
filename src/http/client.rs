//! Instrumented outbound HTTP client.
//!
//! Wraps the process-wide `reqwest::Client`. Calls made with a context that
//! carries a transaction are recorded as external segments and propagate
//! the trace with a `traceparent` header.

use std::time::Duration;

use reqwest::header::HeaderValue;
use thiserror::Error;

use crate::apm::propagation::TRACEPARENT;
use crate::apm::RequestContext;

/// Outbound call failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot build request: {0}")]
    RequestBuild(#[source] reqwest::Error),

    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Build the shared connection pool used for every outbound call.
pub fn build_http_client(
    connect_timeout: Duration,
    use_system_proxy: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect_timeout);
    if !use_system_proxy {
        builder = builder.no_proxy();
    }
    builder.build()
}

#[derive(Debug, Clone)]
pub struct InstrumentedClient {
    client: reqwest::Client,
}

impl InstrumentedClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// GET `url` as a child span of the context's transaction.
    ///
    /// Any response, whatever its status, is returned as `Ok`.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self
            .client
            .get(url)
            .timeout(timeout)
            .build()
            .map_err(FetchError::RequestBuild)?;

        let segment = ctx.transaction().map(|txn| txn.start_external_segment(url));
        if let Some(traceparent) = segment.as_ref().and_then(|s| s.traceparent()) {
            if let Ok(value) = HeaderValue::from_str(&traceparent) {
                request.headers_mut().insert(TRACEPARENT, value);
            }
        }

        match self.client.execute(request).await {
            Ok(response) => {
                if let Some(segment) = segment {
                    segment.end(Some(response.status()));
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Outbound request failed");
                Err(FetchError::Transport(e))
            }
        }
    }
}
