//! Outbound transport used by each host.
//!
//! [`Transport`] is the seam between a host and the network. The
//! default [`HttpTransport`] wraps the connection-pooled hyper client
//! built by [`build_http_client`]; tests and embedders can plug in
//! their own implementation per host.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::UpstreamError;

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Body>;

// async_trait is required here because hosts hold an Arc<dyn Transport>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError>;
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring` as the default.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

/// Hyper-backed transport with an optional per-request timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: HttpClient,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Builds a transport with its own connection pool.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_client(build_http_client(), timeout)
    }

    /// Shares an existing connection pool. Cloning a client is a refcount bump.
    #[must_use]
    pub const fn with_client(client: HttpClient, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        let pending = self.client.request(request);

        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| UpstreamError::Timeout(timeout))?,
            None => pending.await,
        };

        result
            .map(|response| response.map(Body::new))
            .map_err(|e| UpstreamError::Request {
                source: Box::new(e),
            })
    }
}
