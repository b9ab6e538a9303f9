//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (bind address)
//!     → environment overlay (license key, app name)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow running with only the license key set
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigOverrides};
pub use schema::{
    ApmConfig, FetchConfig, HttpClientConfig, ListenerConfig, LogFormat, ObservabilityConfig, RelayConfig,
    ServiceConfig, TimeoutConfig,
};
pub use validation::ValidationError;

/// Environment variable carrying the instrumentation license key.
pub const LICENSE_KEY_ENV: &str = "APM_LICENSE_KEY";

/// Optional environment override for the application name.
pub const APP_NAME_ENV: &str = "APM_APP_NAME";
