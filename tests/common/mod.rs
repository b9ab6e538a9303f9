//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    Router,
};
use tokio::net::TcpListener;

use telemetry_relay::config::ServiceConfig;
use telemetry_relay::{Agent, HttpServer, Shutdown};

pub const TEST_LICENSE_KEY: &str = "test-license-key";

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a simple mock backend that returns a fixed 200 response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    serve(Router::new().fallback(move || async move { response })).await
}

/// Start a programmable mock backend. `f` sees the request headers and
/// picks the status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(HeaderMap) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let app = Router::new().fallback(move |headers: HeaderMap| {
        let f = f.clone();
        async move {
            let (status, body) = f(headers).await;
            (StatusCode::from_u16(status).unwrap(), body)
        }
    });
    serve(app).await
}

/// A POST received by the ingestion sink.
#[derive(Debug, Clone)]
pub struct CapturedPost {
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl CapturedPost {
    /// The single record of a `[{"logs": [record]}]` body.
    pub fn record(&self) -> &serde_json::Map<String, serde_json::Value> {
        let outer = self.body.as_array().expect("body is an array");
        assert_eq!(outer.len(), 1, "exactly one envelope");
        let logs = outer[0]["logs"].as_array().expect("logs is an array");
        assert_eq!(logs.len(), 1, "exactly one record");
        logs[0].as_object().expect("record is an object")
    }
}

/// Mock log-ingestion endpoint that records every POST.
#[derive(Clone)]
pub struct IngestSink {
    pub addr: SocketAddr,
    posts: Arc<Mutex<Vec<CapturedPost>>>,
}

impl IngestSink {
    pub fn url(&self) -> String {
        format!("http://{}/log/v1", self.addr)
    }

    pub fn posts(&self) -> Vec<CapturedPost> {
        self.posts.lock().unwrap().clone()
    }
}

pub async fn start_ingest_sink(status: u16) -> IngestSink {
    let posts = Arc::new(Mutex::new(Vec::new()));
    let captured = posts.clone();
    let app = Router::new().fallback(move |headers: HeaderMap, body: Bytes| {
        let captured = captured.clone();
        async move {
            let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
            captured.lock().unwrap().push(CapturedPost { headers, body });
            (StatusCode::from_u16(status).unwrap(), "{}")
        }
    });
    IngestSink {
        addr: serve(app).await,
        posts,
    }
}

/// An address with nothing listening on it.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Service config pointing at local mocks.
pub fn test_config(fetch_url: String, relay_endpoint: String) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.apm.app_name = "integration".into();
    config.apm.license_key = TEST_LICENSE_KEY.into();
    config.fetch.url = fetch_url;
    config.fetch.timeout_secs = 5;
    config.relay.endpoint = relay_endpoint;
    config.relay.timeout_secs = 5;
    config.client.use_system_proxy = false;
    config
}

/// A running server under test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub agent: Agent,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn spawn_server(config: ServiceConfig) -> TestServer {
    let agent = Agent::new(&config.apm).unwrap();
    let server = HttpServer::new(&config, agent.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        agent,
        shutdown,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll `condition` until it holds or `within` elapses.
pub async fn eventually<F>(within: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
