//! Core reverse-proxy load balancing.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every request not addressed to the admin endpoints and hands it to
//! the shared [`Balancer`](balancer::Balancer). Submodules hold the
//! backend [`host`], the [`selector`] policies, the outbound
//! [`transport`], header rewriting ([`headers`]), locally generated
//! responses ([`status`]), and the background [`revive`] monitor.

pub mod balancer;
pub mod headers;
pub mod host;
pub mod revive;
pub mod selector;
pub mod status;
pub mod transport;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::Response;

use crate::server::AppState;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let client_ip = addr.ip().to_string();
    let response: Response<Body> = state.balancer.handle(request, &client_ip).await;

    if response.status().is_server_error() {
        state.stats.failed.fetch_add(1, Ordering::Relaxed);
    } else {
        state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
    }
    response
}
