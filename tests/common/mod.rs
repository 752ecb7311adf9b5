//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response, StatusCode, Version};
use axum::Router;

use gozero::{HttpReverseProxy, ProxyOptions};

/// What a mock upstream observed.
#[derive(Default)]
pub struct UpstreamLog {
    hits: AtomicU32,
    last_version: Mutex<Option<Version>>,
}

impl UpstreamLog {
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_version(&self) -> Option<Version> {
        *self.last_version.lock().unwrap()
    }

    fn observe(&self, req: &Request<Body>) -> u32 {
        *self.last_version.lock().unwrap() = Some(req.version());
        self.hits.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct MockState {
    log: Arc<UpstreamLog>,
    respond: Arc<dyn Fn(u32, &str) -> (StatusCode, String) + Send + Sync>,
}

async fn mock_handler(State(state): State<MockState>, req: Request<Body>) -> Response<Body> {
    let attempt = state.log.observe(&req);
    let (status, body) = (state.respond)(attempt, req.uri().path());
    Response::builder()
        .status(status)
        .body(Body::from(body))
        .unwrap()
}

/// Start a mock upstream whose responses are computed from the attempt
/// counter and the request path. Serves HTTP/1.1 and h2c.
pub async fn start_programmable_upstream<F>(port: u16, respond: F) -> Arc<UpstreamLog>
where
    F: Fn(u32, &str) -> (StatusCode, String) + Send + Sync + 'static,
{
    let log = Arc::new(UpstreamLog::default());
    let state = MockState {
        log: log.clone(),
        respond: Arc::new(respond),
    };

    let app = Router::new().fallback(mock_handler).with_state(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind mock upstream");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock upstream died");
    });

    log
}

/// Start a mock upstream with the fixed test routes:
/// `/pass` → 200 "Hello, World!", `/fail` → 500 "Internal Server Error".
pub async fn start_upstream(port: u16) -> Arc<UpstreamLog> {
    start_programmable_upstream(port, |_, path| match path {
        "/pass" => (StatusCode::OK, "Hello, World!".to_string()),
        "/fail" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        ),
        _ => (StatusCode::NOT_FOUND, "not found".to_string()),
    })
    .await
}

/// Create and start a proxy on the given port.
pub async fn start_proxy(port: u16, buffer: usize) -> HttpReverseProxy {
    let options = ProxyOptions::default()
        .with_listen_port(port)
        .with_buffer_size(buffer);
    let proxy = HttpReverseProxy::new(options).expect("invalid proxy options");
    proxy.start().await.expect("failed to start proxy");
    proxy
}

/// The routing headers a client steers the proxy with in these tests.
pub fn routing_headers(upstream_port: u16) -> Vec<(&'static str, String)> {
    vec![
        ("X-Gozero-Target-Host", "localhost".to_string()),
        ("X-Gozero-Target-Port", upstream_port.to_string()),
        ("X-Gozero-Target-Scheme", "http".to_string()),
        ("X-Gozero-Target-Retries", "10".to_string()),
        ("X-Gozero-Target-Backoff", "100ms".to_string()),
    ]
}

/// Build a GET request against the proxy with the given routing headers.
pub fn proxy_get(
    client: &reqwest::Client,
    proxy_port: u16,
    path: &str,
    headers: &[(&'static str, String)],
) -> reqwest::RequestBuilder {
    let mut req = client.get(format!("http://127.0.0.1:{proxy_port}{path}"));
    for (name, value) in headers {
        req = req.header(*name, value);
    }
    req
}

/// HTTP/1.1 client without pooling, so shutdown never waits on idle
/// connections.
pub fn http1_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Cleartext prior-knowledge HTTP/2 client.
pub fn h2c_client() -> reqwest::Client {
    reqwest::Client::builder()
        .http2_prior_knowledge()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
