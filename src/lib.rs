//! Instrumented demo server with a request-scoped log relay.

pub mod apm;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use apm::{Agent, RequestContext, Transaction};
pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::LogRelay;
