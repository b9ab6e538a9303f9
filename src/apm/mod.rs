//! Application performance instrumentation.
//!
//! # Data Flow
//! ```text
//! startup: ApmConfig → agent.rs (Agent, shared handle)
//!
//! per request:
//!     middleware.rs  → Agent::start_transaction("<METHOD> <PATH>")
//!                    → Transaction in request extensions
//!     context.rs     → RequestContext (extractor, Option<Transaction>)
//!     transaction.rs → linking metadata, external segments
//!     guard drop     → Transaction::end (exactly once)
//! ```
//!
//! # Design Decisions
//! - Request-scoped state travels in request extensions, never thread-locals
//! - Transactions end through an RAII guard so every exit path closes them
//! - Inbound W3C `traceparent` is joined when distributed tracing is enabled

pub mod agent;
pub mod context;
pub mod middleware;
pub mod propagation;
pub mod transaction;

pub use agent::{Agent, AgentError};
pub use context::RequestContext;
pub use middleware::instrument;
pub use transaction::{ExternalSegment, LinkingMetadata, Transaction, TransactionGuard};
