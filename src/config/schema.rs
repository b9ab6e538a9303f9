//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the telemetry relay service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Instrumentation agent settings.
    pub apm: ApmConfig,

    /// Log-ingestion relay settings.
    pub relay: RelayConfig,

    /// Demonstration fetch target.
    pub fetch: FetchConfig,

    /// Shared outbound HTTP client settings.
    pub client: HttpClientConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Instrumentation agent configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApmConfig {
    /// Application name reported as the entity name.
    pub app_name: String,

    /// License key. Normally supplied through the environment.
    #[serde(skip_serializing)]
    pub license_key: String,

    /// Attach trace and span ids to transactions and outbound calls.
    pub distributed_tracing: bool,
}

impl Default for ApmConfig {
    fn default() -> Self {
        Self {
            app_name: "telemetry-relay".to_string(),
            license_key: String::new(),
            distributed_tracing: true,
        }
    }
}

/// Log-ingestion relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Ingestion endpoint receiving log batches.
    pub endpoint: String,

    /// API key sent as `x-license-key`. Falls back to the license key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Per-POST timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://log-api.newrelic.com/log/v1".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

/// Outbound fetch configuration for `GET /fetch`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Target URL.
    pub url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url: "https://aereal.org/".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Settings for the single outbound client shared by fetch and relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            use_system_proxy: true,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Output format for local logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Local log format.
    pub log_format: LogFormat,

    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: "telemetry_relay=debug,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Key used for relay POSTs: the explicit relay key, else the license key.
    pub fn relay_api_key(&self) -> &str {
        self.relay
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(&self.apm.license_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert!(config.apm.distributed_tracing);
        assert!(config.apm.license_key.is_empty());
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.client.use_system_proxy);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [fetch]
            url = "http://127.0.0.1:9000/"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.fetch.url, "http://127.0.0.1:9000/");
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn test_relay_api_key_fallback() {
        let mut config = ServiceConfig::default();
        config.apm.license_key = "license".into();
        assert_eq!(config.relay_api_key(), "license");

        config.relay.api_key = Some(String::new());
        assert_eq!(config.relay_api_key(), "license");

        config.relay.api_key = Some("ingest".into());
        assert_eq!(config.relay_api_key(), "ingest");
    }

    #[test]
    fn test_license_key_not_serialized() {
        let mut config = ServiceConfig::default();
        config.apm.license_key = "secret".into();
        let out = toml::to_string(&config).unwrap();
        assert!(!out.contains("secret"));
    }
}
