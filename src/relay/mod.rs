//! Telemetry relay.
//!
//! # Data Flow
//! ```text
//! handler → LogRelay::log(&RequestContext, message)
//!     → no transaction? return
//!     → record.rs: linking metadata + timestamp (ms) + message
//!     → record.rs: [{"logs": [record]}]
//!     → sender.rs: POST endpoint (x-license-key, application/json)
//!     → log status locally; errors logged, never surfaced
//! ```

pub mod record;
pub mod sender;

pub use record::{build_record, encode_batch, LogBatch, LogRecord};
pub use sender::{LogRelay, RelayError, LICENSE_KEY_HEADER};
