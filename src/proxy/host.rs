//! A single backend host and its health record.
//!
//! # Responsibilities
//! - Own one backend target URL and the transport used to reach it
//! - Forward individual requests to that target
//! - Track its own health: inactive flag, failure count, inactive-since
//! - Count in-flight requests (for least-connections selection)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::InvalidUri;
use axum::http::{Method, Request, Response, StatusCode, Uri, Version};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use parking_lot::RwLock;
use url::Url;

use super::headers::{self, HeaderPolicy};
use super::status::{self, ErrorHandler};
use super::transport::{HttpTransport, Transport};
use crate::error::{TurnstileError, UpstreamError};

/// Optional per-host overrides applied at construction.
#[derive(Clone, Default)]
pub struct HostOptions {
    pub transport: Option<Arc<dyn Transport>>,
    pub error_handler: Option<ErrorHandler>,
    pub headers: HeaderPolicy,
}

impl HostOptions {
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    #[must_use]
    pub const fn with_headers(mut self, headers: HeaderPolicy) -> Self {
        self.headers = headers;
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Health {
    inactive: bool,
    inactive_since: Option<DateTime<Utc>>,
    failures: u32,
    failed_probes: u32,
}

/// A consistent read of a host's health fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub active: bool,
    pub failures: u32,
    pub inactive_since: Option<DateTime<Utc>>,
}

pub struct Host {
    target: Url,
    transport: Arc<dyn Transport>,
    error_handler: ErrorHandler,
    headers: HeaderPolicy,
    health: RwLock<Health>,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("target", &self.target.as_str())
            .field("health", &*self.health.read())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Parse `target` and bind a host to it.
    ///
    /// Only absolute `http`/`https` URLs are accepted.
    pub fn new(target: &str, options: HostOptions) -> Result<Self, TurnstileError> {
        let url = Url::parse(target).map_err(|source| TurnstileError::InvalidTarget {
            target: target.to_string(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TurnstileError::UnsupportedScheme {
                    target: target.to_string(),
                    scheme: other.to_string(),
                })
            }
        }

        let transport = options
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(None)));

        Ok(Self {
            target: url,
            transport,
            error_handler: options
                .error_handler
                .unwrap_or_else(status::default_error_handler),
            headers: options.headers,
            health: RwLock::new(Health::default()),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// A fresh copy of the backend URL, re-parsed from the stored form.
    pub fn target(&self) -> Result<Url, TurnstileError> {
        Url::parse(self.target.as_str()).map_err(|e| {
            TurnstileError::InvalidState(format!(
                "host target '{}' no longer parses: {e}",
                self.target
            ))
        })
    }

    /// The stored target in its serialized form.
    #[must_use]
    pub fn target_str(&self) -> &str {
        self.target.as_str()
    }

    #[must_use]
    pub fn active(&self) -> bool {
        !self.health.read().inactive
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.health.read().failures
    }

    #[must_use]
    pub fn inactive_since(&self) -> Option<DateTime<Utc>> {
        self.health.read().inactive_since
    }

    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        let health = self.health.read();
        HealthSnapshot {
            active: !health.inactive,
            failures: health.failures,
            inactive_since: health.inactive_since,
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Clear the inactive flag only. Failures and inactive-since are kept.
    pub fn mark_active(&self) {
        let mut health = self.health.write();
        health.inactive = false;
        health.failed_probes = 0;
    }

    /// Full recovery.
    pub fn mark_healthy(&self) {
        let mut health = self.health.write();
        *health = Health::default();
    }

    /// Record a failure. Returns the failure count after the increment.
    ///
    /// `inactive_since` is only stamped by the first failure after a recovery.
    pub fn mark_inactive(&self) -> u32 {
        let mut health = self.health.write();
        health.inactive = true;
        if health.inactive_since.is_none() {
            health.inactive_since = Some(Utc::now());
        }
        health.failures = health.failures.saturating_add(1);
        health.failures
    }

    /// Record a failed revive probe. Returns the consecutive failed-probe count.
    pub fn record_failed_probe(&self) -> u32 {
        let mut health = self.health.write();
        health.inactive = true;
        if health.inactive_since.is_none() {
            health.inactive_since = Some(Utc::now());
        }
        health.failures = health.failures.saturating_add(1);
        health.failed_probes = health.failed_probes.saturating_add(1);
        health.failed_probes
    }

    /// Whether `revive_timeout` has elapsed since the host went inactive.
    #[must_use]
    pub fn revive_due(&self, revive_timeout: Duration, now: DateTime<Utc>) -> bool {
        self.inactive_since().map_or(true, |since| {
            (now - since)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= revive_timeout)
        })
    }

    /// Mark one request as in flight until the returned guard drops.
    #[must_use]
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            host: Arc::clone(self),
        }
    }

    /// Forward `request` to this host's target.
    ///
    /// Upstream failures are recorded with [`mark_inactive`](Self::mark_inactive)
    /// and answered by the host's error handler. A success on a host with
    /// recorded failures is a full recovery. The request counts as in flight
    /// until the returned body is finished or dropped.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn serve(
        self: &Arc<Self>,
        request: Request<Body>,
        client_ip: &str,
        correlation_id: &str,
    ) -> Response<Body> {
        let guard = self.track();
        let start = std::time::Instant::now();

        let upstream = match self.upstream_request(request, client_ip, correlation_id) {
            Ok(req) => req,
            Err(e) => return self.fail(&e, correlation_id, start),
        };

        match self.transport.round_trip(upstream).await {
            Ok(mut response) => {
                if self.failures() > 0 {
                    tracing::info!(target = %self.target, "host recovered");
                    self.mark_healthy();
                }
                headers::strip_response_hop_by_hop(response.headers_mut());
                tracing::debug!(
                    correlation_id = %correlation_id,
                    target = %self.target,
                    status = response.status().as_u16(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "upstream responded"
                );
                hold_until_body_done(response, guard)
            }
            Err(e) => self.fail(&e, correlation_id, start),
        }
    }

    /// Send a bare probe request to `path` on this host.
    pub async fn probe(
        &self,
        method: &Method,
        path: &str,
        timeout: Duration,
    ) -> Result<StatusCode, UpstreamError> {
        let path_uri: Uri = path
            .parse()
            .map_err(|e: InvalidUri| UpstreamError::InvalidRequest(e.to_string()))?;
        let uri =
            headers::rewrite_uri(&self.target, &path_uri).map_err(UpstreamError::InvalidRequest)?;

        let request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(hyper::header::USER_AGENT, "turnstile-revive-probe")
            .body(Body::empty())
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;

        let response = tokio::time::timeout(timeout, self.transport.round_trip(request))
            .await
            .map_err(|_| UpstreamError::Timeout(timeout))??;
        Ok(response.status())
    }

    fn upstream_request(
        &self,
        request: Request<Body>,
        client_ip: &str,
        correlation_id: &str,
    ) -> Result<Request<Body>, UpstreamError> {
        let (mut parts, body) = request.into_parts();
        parts.uri =
            headers::rewrite_uri(&self.target, &parts.uri).map_err(UpstreamError::InvalidRequest)?;
        parts.headers = headers::build_forwarded_headers(
            &parts.headers,
            client_ip,
            &self.target,
            &self.headers,
            correlation_id,
        );
        // The outbound client speaks HTTP/1.1 regardless of the inbound version.
        parts.version = Version::HTTP_11;
        Ok(Request::from_parts(parts, body))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn fail(
        &self,
        err: &UpstreamError,
        correlation_id: &str,
        start: std::time::Instant,
    ) -> Response<Body> {
        // The request never left this process, so the host is not to blame.
        if let UpstreamError::InvalidRequest(_) = err {
            tracing::warn!(
                correlation_id = %correlation_id,
                target = %self.target,
                error = %err,
                "could not build upstream request"
            );
            return (self.error_handler)(err);
        }

        let failures = self.mark_inactive();
        tracing::warn!(
            correlation_id = %correlation_id,
            target = %self.target,
            error = %err,
            failures,
            latency_ms = start.elapsed().as_millis() as u64,
            "upstream request failed"
        );
        (self.error_handler)(err)
    }
}

/// Move `guard` into the response body so it drops with the body.
fn hold_until_body_done(response: Response<Body>, guard: InFlightGuard) -> Response<Body> {
    response.map(|body| {
        Body::new(body.map_frame(move |frame| {
            let _held = &guard;
            frame
        }))
    })
}

/// Decrements the host's in-flight count on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    host: Arc<Host>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.host.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
