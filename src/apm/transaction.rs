//! Transactions and external segments.
//!
//! A [`Transaction`] is the trace span for one inbound request. It is a
//! shared handle: the middleware, the request extensions and any handler
//! code all hold clones of the same span, and `end` takes effect once.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::http::{header, Method, Request, StatusCode};

use crate::apm::agent::Agent;
use crate::apm::propagation::{format_traceparent, new_span_id, new_trace_id, TraceParent};
use crate::observability::metrics;

/// Key/value pairs that correlate a log line with its trace and entity.
pub type LinkingMetadata = BTreeMap<&'static str, String>;

pub const KEY_TRACE_ID: &str = "trace.id";
pub const KEY_SPAN_ID: &str = "span.id";
pub const KEY_ENTITY_NAME: &str = "entity.name";
pub const KEY_ENTITY_TYPE: &str = "entity.type";
pub const KEY_ENTITY_GUID: &str = "entity.guid";
pub const KEY_HOSTNAME: &str = "hostname";

/// Inbound request shape recorded on the transaction.
#[derive(Debug, Clone)]
pub struct WebRequest {
    pub method: Method,
    pub path: String,
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

/// Trace span for one in-flight request.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    agent: Agent,
    name: String,
    // Bounded label for metrics; falls back to `name`.
    metric_name: OnceLock<String>,
    trace_id: String,
    span_id: String,
    parent_id: Option<String>,
    started_at: SystemTime,
    start: Instant,
    request: OnceLock<WebRequest>,
    // 0 until a response has been recorded.
    status: AtomicU16,
    external_calls: AtomicU32,
    ended: AtomicBool,
}

impl Transaction {
    pub(crate) fn start(agent: Agent, name: String, parent: Option<&TraceParent>) -> Self {
        let (trace_id, parent_id) = match parent {
            Some(p) => (p.trace_id.clone(), Some(p.parent_id.clone())),
            None => (new_trace_id(), None),
        };

        let txn = Self {
            inner: Arc::new(TransactionInner {
                agent,
                name,
                metric_name: OnceLock::new(),
                trace_id,
                span_id: new_span_id(),
                parent_id,
                started_at: SystemTime::now(),
                start: Instant::now(),
                request: OnceLock::new(),
                status: AtomicU16::new(0),
                external_calls: AtomicU32::new(0),
                ended: AtomicBool::new(false),
            }),
        };

        tracing::debug!(
            transaction = %txn.inner.name,
            trace_id = %txn.inner.trace_id,
            span_id = %txn.inner.span_id,
            "Transaction started"
        );
        txn
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name used as the metrics label. Only the first call has effect.
    pub fn set_metric_name(&self, name: impl Into<String>) {
        let _ = self.inner.metric_name.set(name.into());
    }

    pub fn metric_name(&self) -> &str {
        self.inner
            .metric_name
            .get()
            .map(String::as_str)
            .unwrap_or(&self.inner.name)
    }

    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.inner.span_id
    }

    /// Span id of the remote caller when the trace was joined.
    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent_id.as_deref()
    }

    /// Milliseconds since the Unix epoch at which the transaction started.
    pub fn start_millis(&self) -> u64 {
        self.inner
            .started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Record the inbound request. Only the first call has effect.
    pub fn set_web_request<B>(&self, request: &Request<B>) {
        let header_str = |name: header::HeaderName| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let _ = self.inner.request.set(WebRequest {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            host: header_str(header::HOST),
            user_agent: header_str(header::USER_AGENT),
        });
    }

    pub fn web_request(&self) -> Option<&WebRequest> {
        self.inner.request.get()
    }

    /// Record the outbound response status.
    pub fn set_web_response(&self, status: StatusCode) {
        self.inner.status.store(status.as_u16(), Ordering::Relaxed);
    }

    pub fn response_status(&self) -> Option<StatusCode> {
        match self.inner.status.load(Ordering::Relaxed) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }

    /// Pairs used to correlate logs with this transaction.
    pub fn linking_metadata(&self) -> LinkingMetadata {
        let agent = &self.inner.agent;
        let mut md = LinkingMetadata::new();
        if agent.distributed_tracing() {
            md.insert(KEY_TRACE_ID, self.inner.trace_id.clone());
            md.insert(KEY_SPAN_ID, self.inner.span_id.clone());
        }
        md.insert(KEY_ENTITY_NAME, agent.app_name().to_string());
        md.insert(KEY_ENTITY_TYPE, "SERVICE".to_string());
        md.insert(KEY_ENTITY_GUID, agent.entity_guid().to_string());
        md.insert(KEY_HOSTNAME, agent.hostname().to_string());
        md
    }

    /// Open a child span for an outbound HTTP call.
    pub fn start_external_segment(&self, url: &str) -> ExternalSegment {
        self.inner.external_calls.fetch_add(1, Ordering::Relaxed);
        ExternalSegment {
            transaction: self.clone(),
            span_id: new_span_id(),
            url: url.to_string(),
            start: Instant::now(),
            ended: false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::Acquire)
    }

    /// End the transaction. Idempotent.
    pub fn end(&self) {
        if self.inner.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let elapsed = self.inner.start.elapsed();
        self.inner.agent.record_finished();
        metrics::record_transaction(self.metric_name(), elapsed);

        let status = self.inner.status.load(Ordering::Relaxed);
        tracing::info!(
            transaction = %self.inner.name,
            trace_id = %self.inner.trace_id,
            start_ms = self.start_millis(),
            status = status,
            external_calls = self.inner.external_calls.load(Ordering::Relaxed),
            duration_ms = elapsed.as_millis() as u64,
            "Transaction finished"
        );
    }

    /// Guard that ends the transaction when dropped.
    pub fn guard(&self) -> TransactionGuard {
        TransactionGuard(self.clone())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.inner.name)
            .field("trace_id", &self.inner.trace_id)
            .field("span_id", &self.inner.span_id)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// Ends the wrapped transaction on drop, including during unwinding.
#[must_use = "the transaction ends as soon as the guard is dropped"]
pub struct TransactionGuard(Transaction);

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        self.0.end();
    }
}

/// Child span covering one outbound HTTP call.
pub struct ExternalSegment {
    transaction: Transaction,
    span_id: String,
    url: String,
    start: Instant,
    ended: bool,
}

impl ExternalSegment {
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// `traceparent` value for the outbound request, or `None` when
    /// distributed tracing is off.
    pub fn traceparent(&self) -> Option<String> {
        self.transaction
            .inner
            .agent
            .distributed_tracing()
            .then(|| format_traceparent(self.transaction.trace_id(), &self.span_id))
    }

    /// Close the segment with the response status, if one was received.
    pub fn end(mut self, status: Option<StatusCode>) {
        self.finish(status);
    }

    fn finish(&mut self, status: Option<StatusCode>) {
        if std::mem::replace(&mut self.ended, true) {
            return;
        }
        tracing::debug!(
            transaction = %self.transaction.name(),
            span_id = %self.span_id,
            url = %self.url,
            status = status.map(|s| s.as_u16()),
            duration_ms = self.start.elapsed().as_millis() as u64,
            "External segment finished"
        );
    }
}

impl Drop for ExternalSegment {
    fn drop(&mut self) {
        self.finish(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApmConfig;

    fn agent(distributed_tracing: bool) -> Agent {
        Agent::new(&ApmConfig {
            app_name: "unit".into(),
            license_key: "k".into(),
            distributed_tracing,
        })
        .unwrap()
    }

    #[test]
    fn test_linking_metadata() {
        let agent = agent(true);
        let txn = agent.start_transaction("GET /");
        let md = txn.linking_metadata();
        assert_eq!(md[KEY_TRACE_ID], txn.trace_id());
        assert_eq!(md[KEY_SPAN_ID], txn.span_id());
        assert_eq!(md[KEY_ENTITY_NAME], "unit");
        assert_eq!(md[KEY_ENTITY_TYPE], "SERVICE");
        assert_eq!(md[KEY_ENTITY_GUID], agent.entity_guid());
        assert!(md.contains_key(KEY_HOSTNAME));
    }

    #[test]
    fn test_linking_metadata_without_distributed_tracing() {
        let txn = agent(false).start_transaction("GET /");
        let md = txn.linking_metadata();
        assert!(!md.contains_key(KEY_TRACE_ID));
        assert!(!md.contains_key(KEY_SPAN_ID));
        assert!(md.contains_key(KEY_ENTITY_GUID));
    }

    #[test]
    fn test_joins_parent_trace() {
        let parent = TraceParent {
            trace_id: "4bf92f3577b34da6a3ce929d0e0e4736".into(),
            parent_id: "00f067aa0ba902b7".into(),
            sampled: true,
        };
        let txn = agent(true).start_transaction_with_parent("GET /", Some(&parent));
        assert_eq!(txn.trace_id(), parent.trace_id);
        assert_eq!(txn.parent_id(), Some("00f067aa0ba902b7"));
        assert_ne!(txn.span_id(), parent.parent_id);
    }

    #[test]
    fn test_records_request_and_response() {
        let txn = agent(true).start_transaction("GET /fetch");
        let req = Request::builder()
            .method(Method::GET)
            .uri("/fetch?x=1")
            .header(header::HOST, "localhost:8000")
            .header(header::USER_AGENT, "curl/8")
            .body(())
            .unwrap();
        txn.set_web_request(&req);
        assert_eq!(txn.response_status(), None);
        txn.set_web_response(StatusCode::OK);

        let recorded = txn.web_request().unwrap();
        assert_eq!(recorded.path, "/fetch");
        assert_eq!(recorded.host.as_deref(), Some("localhost:8000"));
        assert_eq!(recorded.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(txn.response_status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_metric_name_defaults_to_name() {
        let txn = agent(true).start_transaction("GET /users/42");
        assert_eq!(txn.metric_name(), "GET /users/42");

        txn.set_metric_name("GET /users/{id}");
        txn.set_metric_name("GET unmatched");
        assert_eq!(txn.metric_name(), "GET /users/{id}");
        assert_eq!(txn.name(), "GET /users/42");
    }

    #[test]
    fn test_guard_ends_on_panic() {
        let agent = agent(true);
        let txn = agent.start_transaction("GET /boom");
        let handle = txn.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = txn.guard();
            panic!("handler failed");
        }));
        assert!(result.is_err());
        assert!(handle.is_ended());
        assert_eq!(agent.finished_transactions(), 1);
    }

    #[test]
    fn test_external_segment_traceparent() {
        let txn = agent(true).start_transaction("GET /fetch");
        let segment = txn.start_external_segment("http://example.com/");
        let header = segment.traceparent().unwrap();
        let parsed = TraceParent::parse(&header).unwrap();
        assert_eq!(parsed.trace_id, txn.trace_id());
        assert_eq!(parsed.parent_id, segment.span_id());
        segment.end(Some(StatusCode::OK));

        let segment = agent(false)
            .start_transaction("GET /fetch")
            .start_external_segment("http://example.com/");
        assert!(segment.traceparent().is_none());
    }
}
