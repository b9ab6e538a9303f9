//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → apm::instrument (transaction per request)
//!     → handlers.rs (GET /, GET /fetch)
//!         → client.rs (instrumented outbound GET)
//!         → relay (one log line)
//!     → Send to client
//! ```

pub mod client;
pub mod handlers;
pub mod server;

pub use client::{FetchError, InstrumentedClient};
pub use handlers::FetchStatus;
pub use server::{AppState, HttpServer};
