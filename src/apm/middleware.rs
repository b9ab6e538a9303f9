//! Instrumentation middleware.
//!
//! Wraps every request that reaches the router in a transaction named
//! `"<METHOD> <PATH>"`. The transaction is stored in the request extensions
//! for [`RequestContext`](crate::apm::RequestContext) and is ended when the
//! middleware future completes or is dropped (timeout, disconnect, panic).
//!
//! Metrics are labelled with the matched route template, never the raw
//! path, so unknown URLs all share the [`UNMATCHED_ROUTE`] series.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::apm::agent::Agent;
use crate::apm::propagation::{TraceParent, TRACEPARENT};
use crate::observability::metrics;

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Method label for extension methods.
pub const OTHER_METHOD: &str = "OTHER";

/// Transaction name for a request.
pub fn transaction_name(method: &Method, path: &str) -> String {
    format!("{method} {path}")
}

/// Metrics label for a method: standard methods by name, anything else
/// as [`OTHER_METHOD`].
pub fn method_label(method: &Method) -> &str {
    let known = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::HEAD,
        Method::OPTIONS,
        Method::CONNECT,
        Method::PATCH,
        Method::TRACE,
    ];
    if known.contains(method) {
        method.as_str()
    } else {
        OTHER_METHOD
    }
}

/// Metrics label for the route a request matched.
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// `axum::middleware::from_fn_with_state` entry point.
pub async fn instrument(State(agent): State<Agent>, mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);
    let method_tag = method_label(&method).to_string();

    let parent = request
        .headers()
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .and_then(TraceParent::parse);

    let txn = agent.start_transaction_with_parent(transaction_name(&method, &path), parent.as_ref());
    txn.set_metric_name(format!("{method_tag} {route}"));
    let _guard = txn.guard();

    txn.set_web_request(&request);
    request.extensions_mut().insert(txn.clone());

    let response = next.run(request).await;

    txn.set_web_response(response.status());
    metrics::record_request(&method_tag, response.status().as_u16(), &route, start);

    response
}
