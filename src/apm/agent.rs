//! Application-level instrumentation handle.
//!
//! One `Agent` is built at startup and shared by every request. It owns the
//! entity identity reported in linking metadata and counts transactions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::apm::propagation::TraceParent;
use crate::apm::transaction::Transaction;
use crate::config::ApmConfig;

/// Errors raised while constructing the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("license key required")]
    MissingLicenseKey,

    #[error("application name must not be empty")]
    MissingAppName,
}

/// Shared instrumentation handle. Cheap to clone.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    app_name: String,
    entity_guid: String,
    hostname: String,
    distributed_tracing: bool,
    started: AtomicU64,
    finished: AtomicU64,
}

impl Agent {
    /// Create the agent. Fails fast when the license key is missing.
    pub fn new(config: &ApmConfig) -> Result<Self, AgentError> {
        if config.license_key.trim().is_empty() {
            return Err(AgentError::MissingLicenseKey);
        }
        if config.app_name.trim().is_empty() {
            return Err(AgentError::MissingAppName);
        }

        let hostname = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());

        let agent = Self {
            inner: Arc::new(AgentInner {
                app_name: config.app_name.clone(),
                entity_guid: Uuid::new_v4().to_string(),
                hostname,
                distributed_tracing: config.distributed_tracing,
                started: AtomicU64::new(0),
                finished: AtomicU64::new(0),
            }),
        };

        tracing::info!(
            app_name = %agent.inner.app_name,
            entity_guid = %agent.inner.entity_guid,
            distributed_tracing = agent.inner.distributed_tracing,
            "APM agent initialized"
        );

        Ok(agent)
    }

    /// Start a transaction on a fresh trace.
    pub fn start_transaction(&self, name: impl Into<String>) -> Transaction {
        self.start_transaction_with_parent(name, None)
    }

    /// Start a transaction, joining `parent`'s trace when distributed
    /// tracing is enabled.
    pub fn start_transaction_with_parent(
        &self,
        name: impl Into<String>,
        parent: Option<&TraceParent>,
    ) -> Transaction {
        let parent = parent.filter(|_| self.inner.distributed_tracing);
        self.inner.started.fetch_add(1, Ordering::Relaxed);
        Transaction::start(self.clone(), name.into(), parent)
    }

    pub fn app_name(&self) -> &str {
        &self.inner.app_name
    }

    pub fn entity_guid(&self) -> &str {
        &self.inner.entity_guid
    }

    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    pub fn distributed_tracing(&self) -> bool {
        self.inner.distributed_tracing
    }

    /// Total transactions started since the agent was created.
    pub fn started_transactions(&self) -> u64 {
        self.inner.started.load(Ordering::Relaxed)
    }

    /// Total transactions ended since the agent was created.
    pub fn finished_transactions(&self) -> u64 {
        self.inner.finished.load(Ordering::Relaxed)
    }

    /// Transactions started but not yet ended.
    pub fn active_transactions(&self) -> u64 {
        self.started_transactions()
            .saturating_sub(self.finished_transactions())
    }

    pub(crate) fn record_finished(&self) {
        self.inner.finished.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("app_name", &self.inner.app_name)
            .field("entity_guid", &self.inner.entity_guid)
            .finish()
    }
}
