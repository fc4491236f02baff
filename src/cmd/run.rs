//! `turnstile run`: start the load balancer.
//!
//! Loads the host pool from a config file, starts the Axum HTTP server
//! with graceful shutdown, and spawns the background revive monitor
//! that probes inactive hosts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;

use crate::cli::RunArgs;
use crate::config;
use crate::config::model::Config;
use crate::error::TurnstileError;
use crate::logging;
use crate::proxy::balancer::{Balancer, BalancerOptions};
use crate::proxy::host::HostOptions;
use crate::proxy::revive::ReviveMonitor;
use crate::proxy::status;
use crate::proxy::transport::{build_http_client, HttpClient, HttpTransport};
use crate::server::{self, AppState, Stats};

pub async fn execute(args: RunArgs) -> Result<(), TurnstileError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let path = config::resolve_config_path(args.config.as_deref())?;
    if args.config.is_none() {
        tracing::info!(path = %path.display(), "auto-detected config file");
    }
    let source = config::source_for_path(&path)?;
    let (mut config, version) = source.load().await?;

    if let Some(timeout) = args.timeout {
        config.defaults.timeout = timeout;
    }
    if let Some(selector) = args.selector {
        config.selector = selector;
    }

    let balancer = Arc::new(build_balancer(&config, &build_http_client())?);
    let host_count = balancer.active_count();

    let state = Arc::new(AppState {
        balancer: Arc::clone(&balancer),
        config_version: version,
        source_name: source.name().to_string(),
        start_time: Instant::now(),
        stats: Stats::new(),
    });

    // Shutdown signal: sending on shutdown_tx stops the revive monitor
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let monitor = ReviveMonitor::new(Arc::clone(&balancer), config.health.probe());
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        hosts = host_count,
        selector = balancer.selector_name(),
        "turnstile started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    // Wait for the revive monitor to finish (catches panics)
    if let Err(e) = monitor_handle.await {
        tracing::error!(error = %e, "revive monitor task failed");
    }

    tracing::info!("turnstile stopped");
    Ok(())
}

/// Build the balancer described by `config`.
///
/// Every host shares `client`'s connection pool but gets its own
/// timeout and error handler.
pub fn build_balancer(config: &Config, client: &HttpClient) -> Result<Balancer, TurnstileError> {
    let headers = config.defaults.header_policy();

    let targets = config.hosts.iter().map(|entry| {
        let transport = HttpTransport::with_client(client.clone(), Some(config.host_timeout(entry)));
        let mut options = HostOptions::default()
            .with_transport(Arc::new(transport))
            .with_headers(headers);

        if let Some(code) = entry.error_status.and_then(|s| StatusCode::from_u16(s).ok()) {
            options = options.with_error_handler(status::fixed_status_handler(code));
        }
        (entry.target.as_str(), options)
    });

    let options = BalancerOptions::default()
        .with_selector(config.selector.build())
        .with_policy(config.health.policy())
        .lenient(config.lenient);

    Balancer::from_targets(targets, options)
}
