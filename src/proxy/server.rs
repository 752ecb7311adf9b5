//! Proxy server: listening socket, handler chain, lifecycle.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Request, Response, StatusCode};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::schema::ProxyOptions;
use crate::config::validation::{validate_options, ConfigError};
use crate::events::{EventPublisher, EventQueue, EventStream};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::director;
use crate::proxy::response::rewrite_response;
use crate::transport::{ConditionalTransport, RetryTransport, Transport};

/// How long in-flight requests get to finish once shutdown is triggered.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Scheme marking requests that never made it past the director; the
/// error policy maps it to 503 instead of 502.
const ERROR_SENTINEL_SCHEME: &str = "error";

/// Error type for proxy lifecycle operations.
#[derive(Debug)]
pub enum ProxyError {
    /// Failed to bind the listening socket.
    Bind(std::io::Error),
    /// `start` was called on an already running proxy.
    AlreadyStarted,
    /// `start` was called after the proxy terminated.
    Terminated,
    /// The serve task ended abnormally.
    Serve(tokio::task::JoinError),
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::Bind(err) => write!(f, "Failed to bind: {err}"),
            ProxyError::AlreadyStarted => write!(f, "Proxy is already running"),
            ProxyError::Terminated => write!(f, "Proxy has terminated"),
            ProxyError::Serve(err) => write!(f, "Serve task failed: {err}"),
        }
    }
}

impl std::error::Error for ProxyError {}

/// State shared with every request handler.
#[derive(Clone)]
struct AppState {
    publisher: EventPublisher,
    transport: Arc<dyn Transport>,
    dev_mode: bool,
}

/// The scale-to-zero reverse proxy.
///
/// Owns the listener, the routing-event queue, and the transport stack.
/// Lifecycle: created → running (`start`) → draining (shutdown
/// triggered) → terminated (`shutdown` complete); terminal is absorbing.
pub struct HttpReverseProxy {
    options: ProxyOptions,
    events: EventQueue,
    shutdown: Shutdown,
    serve_task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpReverseProxy {
    /// Validate the options and allocate the event queue. The socket is
    /// not bound until [`start`](Self::start).
    pub fn new(options: ProxyOptions) -> Result<Self, ConfigError> {
        validate_options(&options)?;
        let events = EventQueue::new(options.buffer_size);
        Ok(Self {
            options,
            events,
            shutdown: Shutdown::new(),
            serve_task: Mutex::new(None),
        })
    }

    /// The options this proxy was built with.
    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    /// Take the routing-event stream. Yields `Some` exactly once; stream
    /// closure means the proxy has terminated.
    pub fn requests(&self) -> Option<EventStream> {
        self.events.take_stream()
    }

    /// Bind the listener and spawn the accept loop. Non-blocking: returns
    /// once the server is accepting so shutdown coordination can proceed.
    ///
    /// Connection-level protocol negotiation (HTTP/1.1 vs the h2c
    /// preface) happens underneath `axum::serve`.
    pub async fn start(&self) -> Result<(), ProxyError> {
        {
            let slot = self.serve_task.lock().expect("serve task lock poisoned");
            if slot.is_some() {
                return Err(ProxyError::AlreadyStarted);
            }
        }
        if self.shutdown.is_triggered() {
            return Err(ProxyError::Terminated);
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.options.listen_port));
        let listener = TcpListener::bind(addr).await.map_err(ProxyError::Bind)?;
        let local_addr = listener.local_addr().map_err(ProxyError::Bind)?;

        let publisher = self.events.publisher().ok_or(ProxyError::Terminated)?;
        let state = AppState {
            publisher,
            transport: Arc::new(RetryTransport::new(
                ConditionalTransport::new(),
                self.shutdown.clone(),
            )),
            dev_mode: self.options.dev_mode,
        };

        let app = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        let mut signal = self.shutdown.subscribe();
        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { signal.wait().await });

        tracing::info!(address = %local_addr, "Starting reverse proxy server");

        let handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                tracing::error!(error = %err, "Reverse proxy server error");
            }
        });

        let mut slot = self.serve_task.lock().expect("serve task lock poisoned");
        if slot.is_some() {
            handle.abort();
            return Err(ProxyError::AlreadyStarted);
        }
        *slot = Some(handle);

        Ok(())
    }

    /// Stop accepting, give in-flight requests a bounded drain window,
    /// then close the event queue. Idempotent: a second call returns
    /// immediately. The first observed error is returned, later ones are
    /// logged and suppressed.
    pub async fn shutdown(&self) -> Result<(), ProxyError> {
        let task = {
            let mut slot = self.serve_task.lock().expect("serve task lock poisoned");
            slot.take()
        };

        self.shutdown.trigger();

        let Some(task) = task else {
            // Never started, or a previous shutdown already ran.
            self.events.close();
            return Ok(());
        };

        tracing::info!(
            port = self.options.listen_port,
            "Reverse proxy server shutting down"
        );

        let result = match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Failed to shut down reverse proxy server");
                Err(ProxyError::Serve(err))
            }
            Err(_) => {
                tracing::warn!("Shutdown grace period expired with requests still in flight");
                Ok(())
            }
        };

        // The stream terminates once the last in-flight publisher drains.
        self.events.close();
        result
    }
}

async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    mut req: Request<Body>,
) -> Response<Body> {
    let started = Instant::now();
    let request_id = request_id(req.headers());
    let method = req.method().to_string();

    let forwarded =
        match director::direct(&mut req, remote_addr, state.dev_mode, &state.publisher).await {
            Ok(forwarded) => forwarded,
            Err(err) => {
                tracing::error!(request_id = %request_id, error = %err, "Director rejected request");
                let response = error_response(ERROR_SENTINEL_SCHEME, &err);
                metrics::record_request(&method, response.status().as_u16(), "", started);
                return response;
            }
        };

    let response = match state.transport.round_trip(req).await {
        Ok(mut response) => {
            rewrite_response(&mut response, &forwarded);
            tracing::debug!(
                request_id = %request_id,
                status = %response.status(),
                host = %forwarded.target_authority,
                "Proxy response"
            );
            response
        }
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                host = %forwarded.target_authority,
                error = %err,
                "Proxy request failed"
            );
            error_response(&forwarded.target_scheme, &err)
        }
    };

    metrics::record_request(
        &method,
        response.status().as_u16(),
        &forwarded.target_authority,
        started,
    );
    response
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Map a failed request to the client-facing status: a request carrying
/// the sentinel scheme never reached the upstream and gets 503, anything
/// else failed at the transport and gets 502 with the error text.
fn error_response(target_scheme: &str, err: &dyn std::fmt::Display) -> Response<Body> {
    if target_scheme == ERROR_SENTINEL_SCHEME {
        return service_unavailable();
    }
    plain_response(StatusCode::BAD_GATEWAY, err.to_string())
}

fn service_unavailable() -> Response<Body> {
    plain_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Service unavailable or starting up".to_string(),
    )
}

fn plain_response(status: StatusCode, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .expect("static response cannot fail")
}
