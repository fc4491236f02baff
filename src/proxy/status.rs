//! Plain-text status responses and upstream error handlers.
//!
//! Every response the balancer produces on its own (as opposed to one
//! relayed from a backend) is built here, so the body text stays
//! consistent: the canonical reason phrase, except for the
//! non-standard `499 Client Closed Request`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

use crate::error::UpstreamError;

pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;
pub const STATUS_CLIENT_CLOSED_REQUEST_TEXT: &str = "Client Closed Request";

const SERVICE_NOT_AVAILABLE: &str = "Service not available";

/// Maps an upstream failure to the response returned to the caller.
pub type ErrorHandler = Arc<dyn Fn(&UpstreamError) -> Response<Body> + Send + Sync>;

#[must_use]
pub fn status_text(status: StatusCode) -> &'static str {
    if status == StatusCode::MISDIRECTED_REQUEST
        || status.as_u16() == STATUS_CLIENT_CLOSED_REQUEST
    {
        STATUS_CLIENT_CLOSED_REQUEST_TEXT
    } else {
        status.canonical_reason().unwrap_or("Unknown Status")
    }
}

#[must_use]
pub fn status_response(status: StatusCode) -> Response<Body> {
    text_response(status, status_text(status))
}

/// The response sent when the active pool is empty.
#[must_use]
pub fn service_unavailable() -> Response<Body> {
    text_response(StatusCode::SERVICE_UNAVAILABLE, SERVICE_NOT_AVAILABLE)
}

fn text_response(status: StatusCode, text: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// `504` for timeouts, `502` for everything else.
#[must_use]
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|err: &UpstreamError| {
        if err.is_timeout() {
            status_response(StatusCode::GATEWAY_TIMEOUT)
        } else {
            status_response(StatusCode::BAD_GATEWAY)
        }
    })
}

/// Always answer upstream failures with `status`.
#[must_use]
pub fn fixed_status_handler(status: StatusCode) -> ErrorHandler {
    Arc::new(move |_: &UpstreamError| status_response(status))
}
