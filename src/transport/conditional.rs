//! Wire-version dispatch between HTTP/1.1 and cleartext HTTP/2 clients.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::{Transport, TransportError};

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(300);

/// Holds one client per wire protocol and picks by the request's version.
///
/// The HTTP/2 client speaks prior-knowledge cleartext HTTP/2 (the upstream
/// is dialed over plain TCP whatever the target scheme says). The two
/// clients share no connection pooling.
pub struct ConditionalTransport {
    h1_client: Client<HttpConnector, Body>,
    h2_client: Client<HttpConnector, Body>,
}

impl ConditionalTransport {
    pub fn new() -> Self {
        // Plain TCP in place of TLS, for https target schemes too.
        let mut connector = HttpConnector::new();
        connector.enforce_http(false);
        connector.set_connect_timeout(Some(DEFAULT_DIAL_TIMEOUT));

        let h1_client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(DEFAULT_IDLE_TIMEOUT)
            .build(connector.clone());

        let h2_client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .build(connector);

        Self {
            h1_client,
            h2_client,
        }
    }
}

impl Default for ConditionalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ConditionalTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError> {
        let response = if req.version() == Version::HTTP_2 {
            tracing::debug!(url = %req.uri(), "Protocol: HTTP/2.0, using HTTP/2 transport for request");
            self.h2_client
                .request(req)
                .await
                .map_err(TransportError::Request)?
        } else {
            tracing::debug!(url = %req.uri(), "Protocol: HTTP/1.1, using HTTP/1.1 transport for request");
            match tokio::time::timeout(
                DEFAULT_RESPONSE_HEADER_TIMEOUT,
                self.h1_client.request(req),
            )
            .await
            {
                Ok(result) => result.map_err(TransportError::Request)?,
                Err(_) => return Err(TransportError::ResponseHeaderTimeout),
            }
        };

        Ok(response.map(Body::new))
    }
}
