//! Request-scoped telemetry context.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::apm::transaction::Transaction;

/// Per-request state passed by reference to code that needs the active
/// transaction. Extracting it never fails; outside the instrumentation
/// middleware it simply carries no transaction.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    transaction: Option<Transaction>,
}

impl RequestContext {
    pub fn with_transaction(transaction: Transaction) -> Self {
        Self {
            transaction: Some(transaction),
        }
    }

    /// The active transaction, if the request was instrumented.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            transaction: parts.extensions.get::<Transaction>().cloned(),
        })
    }
}
