//! Integration tests for the HTTP server: forwarding through real upstreams,
//! passive demotion, the admin endpoints, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::{Json, Router};
use serde_json::{json, Value};

use turnstile::cmd::run::build_balancer;
use turnstile::config::model::{Config, Defaults, HealthConfig, HostEntry};
use turnstile::config::ConfigVersion;
use turnstile::health::HealthResponse;
use turnstile::proxy::balancer::{BalancerState, HealthStatus};
use turnstile::proxy::selector::SelectorKind;
use turnstile::proxy::transport::build_http_client;
use turnstile::server::{self, AppState, Stats};

/// An upstream that answers every request with its name and what it received.
async fn start_upstream(name: &'static str) -> SocketAddr {
    let router = Router::new().fallback(move |req: Request| async move {
        let header = |key: &str| {
            req.headers()
                .get(key)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        Json(json!({
            "host": name,
            "uri": req.uri().to_string(),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_real_ip": header("x-real-ip"),
            "via": header("via"),
            "correlation_id": header("x-correlation-id"),
        }))
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn entry(target: String) -> HostEntry {
    HostEntry {
        target,
        timeout: None,
        error_status: None,
    }
}

fn config(hosts: Vec<HostEntry>) -> Config {
    Config {
        selector: SelectorKind::RoundRobin,
        lenient: false,
        defaults: Defaults {
            timeout: 2000,
            ..Defaults::default()
        },
        health: HealthConfig {
            failure_threshold: 1,
            ..HealthConfig::default()
        },
        hosts,
    }
}

async fn start_balancer(config: &Config) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let balancer = build_balancer(config, &build_http_client()).unwrap();
    let state = Arc::new(AppState {
        balancer: Arc::new(balancer),
        config_version: ConfigVersion::Hash("0123456789abcdef".into()),
        source_name: "test".into(),
        start_time: Instant::now(),
        stats: Stats::new(),
    });

    let router = server::build_router(state, 1_048_576);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

async fn get_json(url: &str) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn round_robin_cycles_through_hosts() {
    let a = start_upstream("a").await;
    let b = start_upstream("b").await;
    let c = start_upstream("c").await;
    let (addr, shutdown) = start_balancer(&config(vec![
        entry(format!("http://{a}")),
        entry(format!("http://{b}")),
        entry(format!("http://{c}")),
    ]))
    .await;

    let mut seen = Vec::new();
    for _ in 0..4 {
        let body = get_json(&format!("http://{addr}/work")).await;
        seen.push(body["host"].as_str().unwrap().to_string());
    }
    assert_eq!(seen, ["a", "b", "c", "a"]);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn forwards_path_query_and_proxy_headers() {
    let a = start_upstream("a").await;
    let (addr, shutdown) =
        start_balancer(&config(vec![entry(format!("http://{a}/base?key=1"))])).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/items?page=2"))
        .header("x-correlation-id", "corr-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-correlation-id"], "corr-123");

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["uri"], "/base/items?key=1&page=2");
    assert_eq!(body["x_forwarded_for"], "127.0.0.1");
    assert_eq!(body["x_real_ip"], "127.0.0.1");
    assert_eq!(body["via"], "1.1 turnstile");
    assert_eq!(body["correlation_id"], "corr-123");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn generates_correlation_id_when_missing() {
    let a = start_upstream("a").await;
    let (addr, shutdown) = start_balancer(&config(vec![entry(format!("http://{a}"))])).await;

    let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
    let header = resp.headers()["x-correlation-id"].to_str().unwrap().to_string();
    let body: Value = resp.json().await.unwrap();

    assert!(!header.is_empty());
    assert_eq!(body["correlation_id"], header.as_str());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn failing_host_leaves_rotation() {
    let dead = dead_addr().await;
    let live = start_upstream("live").await;
    let (addr, shutdown) = start_balancer(&config(vec![
        entry(format!("http://{dead}")),
        entry(format!("http://{live}")),
    ]))
    .await;

    // The first request lands on the dead host and fails.
    let first = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(first.status(), 502);
    assert_eq!(first.text().await.unwrap(), "Bad Gateway");

    for _ in 0..3 {
        let body = get_json(&format!("http://{addr}/")).await;
        assert_eq!(body["host"], "live");
    }

    let state: BalancerState = reqwest::get(format!("http://{addr}/_turnstile/state"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state.selector, "round_robin");
    assert_eq!(state.pool.active.count, 1);
    assert_eq!(state.pool.inactive.count, 1);

    let inactive = &state.pool.inactive.hosts[0];
    assert_eq!(inactive.target, format!("http://{dead}/"));
    assert_eq!(inactive.status, HealthStatus::Inactive);
    assert!(inactive.inactive_since.is_some());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn empty_pool_answers_503() {
    let dead = dead_addr().await;
    let (addr, shutdown) = start_balancer(&config(vec![entry(format!("http://{dead}"))])).await;

    let first = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(first.status(), 502);

    let second = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(second.status(), 503);
    assert_eq!(
        second.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(second.text().await.unwrap(), "Service not available");

    let health = reqwest::get(format!("http://{addr}/_turnstile/health"))
        .await
        .unwrap();
    assert_eq!(health.status(), 503);
    let health: HealthResponse = health.json().await.unwrap();
    assert_eq!(health.status, "unavailable");
    assert_eq!(health.pool.active, 0);
    assert_eq!(health.pool.inactive, 1);
    assert_eq!(health.stats.requests_failed, 2);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn per_host_error_status_overrides_default() {
    let dead = dead_addr().await;
    let mut host = entry(format!("http://{dead}"));
    host.error_status = Some(503);
    let (addr, shutdown) = start_balancer(&config(vec![host])).await;

    let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(resp.status(), 503);
    assert_eq!(resp.text().await.unwrap(), "Service Unavailable");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_endpoint_reports_pool() {
    let a = start_upstream("a").await;
    let b = start_upstream("b").await;
    let (addr, shutdown) = start_balancer(&config(vec![
        entry(format!("http://{a}")),
        entry(format!("http://{b}")),
    ]))
    .await;

    reqwest::get(format!("http://{addr}/anything")).await.unwrap();

    let resp = reqwest::get(format!("http://{addr}/_turnstile/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let health: HealthResponse = resp.json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.config.source, "test");
    assert_eq!(health.config.version, "01234567");
    assert_eq!(health.pool.selector, "round_robin");
    assert_eq!(health.pool.hosts, 2);
    assert_eq!(health.pool.active, 2);
    assert_eq!(health.stats.requests_forwarded, 1);
    assert_eq!(health.stats.requests_failed, 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn graceful_shutdown_works() {
    let a = start_upstream("a").await;
    let (addr, shutdown) = start_balancer(&config(vec![entry(format!("http://{a}"))])).await;

    let url = format!("http://{addr}/_turnstile/health");
    assert!(reqwest::get(&url).await.is_ok());

    let _ = shutdown.send(());

    // Give it a moment to shut down
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = reqwest::get(&url).await;
    assert!(result.is_err(), "server should be stopped");
}
