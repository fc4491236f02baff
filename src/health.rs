//! Admin endpoints: `GET /_turnstile/health` and `GET /_turnstile/state`.
//!
//! The health endpoint returns a [`HealthResponse`] JSON payload with the
//! server version, uptime, config source metadata, pool counts, and
//! cumulative request statistics. It answers `503` while no host is in
//! rotation so that orchestrators can take the instance out of service.
//! The state endpoint returns the balancer's full pool dump.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::ConfigVersion;
use crate::proxy::balancer::BalancerState;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub pool: PoolHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct PoolHealth {
    pub selector: String,
    pub hosts: usize,
    pub active: usize,
    pub inactive: usize,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
}

pub async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let version_str = match &state.config_version {
        ConfigVersion::Hash(h) => h.get(..8).unwrap_or(h).to_string(),
    };

    let active = state.balancer.active_count();
    let inactive = state.balancer.inactive_count();
    let (status_code, status) = if active > 0 {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("TURNSTILE_GIT_SHORT").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: state.source_name.clone(),
            version: version_str,
        },
        pool: PoolHealth {
            selector: state.balancer.selector_name().to_string(),
            hosts: active + inactive,
            active,
            inactive,
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
        },
    };

    (status_code, Json(body))
}

pub async fn state_handler(State(state): State<Arc<AppState>>) -> Json<BalancerState> {
    Json(state.balancer.state())
}
