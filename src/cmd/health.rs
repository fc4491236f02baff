//! `turnstile health`: check the health of a running instance.
//!
//! Sends a `GET /_turnstile/health` (or `/_turnstile/state` with
//! `--state`) request to the specified URL and displays the response
//! as formatted text or raw JSON.

use console::style;
use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::TurnstileError;
use crate::health::HealthResponse;
use crate::proxy::balancer::{BalancerState, HealthStatus};
use crate::server::{HEALTH_PATH, STATE_PATH};

pub async fn execute(args: HealthArgs) -> Result<(), TurnstileError> {
    let path = if args.state { STATE_PATH } else { HEALTH_PATH };
    let (status, body) = fetch(&args.url, path).await?;
    let body_str = String::from_utf8_lossy(&body);

    // The health endpoint answers 503 with a full body while the pool is empty.
    let unavailable = status == hyper::StatusCode::SERVICE_UNAVAILABLE && !args.state;
    if !status.is_success() && !unavailable {
        return Err(TurnstileError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{body_str}");
    } else if args.state {
        match serde_json::from_str::<BalancerState>(&body_str) {
            Ok(state) => print_state(&state),
            Err(e) => {
                eprintln!("Failed to parse state response: {e}");
                println!("{body_str}");
            }
        }
    } else {
        match serde_json::from_str::<HealthResponse>(&body_str) {
            Ok(health) => print_health(&args.url, &health),
            Err(e) => {
                eprintln!("Failed to parse health response: {e}");
                println!("{body_str}");
            }
        }
    }

    if unavailable {
        return Err(TurnstileError::HealthCheckFailed(status));
    }
    Ok(())
}

async fn fetch(base: &str, path: &str) -> Result<(hyper::StatusCode, bytes::Bytes), TurnstileError> {
    let url = format!("{}{path}", base.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse().map_err(
            |e: hyper::http::uri::InvalidUri| TurnstileError::UriParse {
                source: Box::new(e),
            },
        )?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| TurnstileError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| TurnstileError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| TurnstileError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| TurnstileError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();
    Ok((status, body))
}

fn print_health(url: &str, health: &HealthResponse) {
    let uptime = format_uptime(health.uptime_seconds);
    if health.status == "healthy" {
        println!("{} turnstile is healthy ({url})", style("\u{2713}").green());
    } else {
        println!(
            "{} turnstile has no active hosts ({url})",
            style("\u{2717}").red()
        );
    }
    println!("  uptime:         {uptime}");
    println!("  version:        {} ({})", health.version, health.build);
    println!("  config source:  {}", health.config.source);
    println!("  config version: {}", health.config.version);
    println!(
        "  pool:           {} hosts, {} active, {} inactive ({})",
        health.pool.hosts, health.pool.active, health.pool.inactive, health.pool.selector
    );
    println!(
        "  requests:       {} forwarded, {} failed",
        health.stats.requests_forwarded, health.stats.requests_failed
    );
}

fn print_state(state: &BalancerState) {
    println!(
        "selector: {}  ({} active, {} inactive)",
        state.selector, state.pool.active.count, state.pool.inactive.count
    );
    for host in state.pool.active.hosts.iter().chain(&state.pool.inactive.hosts) {
        let marker = match host.status {
            HealthStatus::Healthy => style("\u{25cf}").green(),
            HealthStatus::Degraded => style("\u{25cf}").yellow(),
            HealthStatus::Inactive => style("\u{25cb}").red(),
        };
        let since = host
            .inactive_since
            .map(|t| format!(", inactive since {}", t.to_rfc3339()))
            .unwrap_or_default();
        println!(
            "  {marker} {}  failures: {}, in flight: {}{since}",
            host.target, host.failures, host.in_flight
        );
    }
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
