//! The load balancer: active/inactive host partitions plus a selector.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → Balancer::handle
//!     → Selector::select(active hosts)   (503 if none are active)
//!     → Host::serve                      (failures recorded on the host)
//!     → demote the host if its failures crossed the threshold
//! ```
//!
//! # Health transitions
//! ```text
//! Healthy  → Degraded: an upstream failure (still in rotation)
//! Degraded → Inactive: failures >= failure_threshold, moved to `inactive`
//! Degraded → Healthy:  any successful response
//! Inactive → Healthy:  successful revive probe (see `revive.rs`)
//! Inactive → Degraded: trial re-admission after revive_threshold failed probes
//! ```
//!
//! The partition lock is never held across an `.await`: selection takes a
//! read lock, clones the chosen host, and releases it before proxying.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use url::Url;

use super::headers::X_CORRELATION_ID;
use super::host::{Host, HostOptions};
use super::selector::{RoundRobin, Selector};
use super::status;
use crate::error::TurnstileError;

/// Thresholds driving demotion and revival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Failures after which a host leaves rotation. Must be at least 1.
    pub failure_threshold: u32,
    /// How long a host stays inactive before it is probed.
    pub revive_timeout: Duration,
    /// Consecutive failed probes after which a host is re-admitted on trial.
    /// Zero disables trial re-admission.
    pub revive_threshold: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            revive_timeout: Duration::from_secs(30),
            revive_threshold: 3,
        }
    }
}

#[derive(Default)]
pub struct BalancerOptions {
    pub selector: Option<Box<dyn Selector>>,
    pub policy: HealthPolicy,
    /// Skip invalid or duplicate hosts instead of failing construction.
    pub lenient: bool,
}

impl BalancerOptions {
    #[must_use]
    pub fn with_selector(mut self, selector: Box<dyn Selector>) -> Self {
        self.selector = Some(selector);
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: HealthPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }
}

#[derive(Debug, Default)]
struct Partitions {
    active: Vec<Arc<Host>>,
    inactive: Vec<Arc<Host>>,
}

pub struct Balancer {
    // Every host in configured order; used to reinsert promoted hosts.
    hosts: Vec<Arc<Host>>,
    partitions: RwLock<Partitions>,
    selector: Box<dyn Selector>,
    policy: HealthPolicy,
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer")
            .field("selector", &self.selector.name())
            .field("policy", &self.policy)
            .field("partitions", &*self.partitions.read())
            .finish()
    }
}

impl std::fmt::Display for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.state_json())
    }
}

impl Balancer {
    /// Build a balancer from already constructed hosts.
    ///
    /// Every host must have a resolvable target and targets must be unique.
    /// Without `lenient`, the first offending host aborts construction.
    pub fn new(hosts: Vec<Host>, options: BalancerOptions) -> Result<Self, TurnstileError> {
        let mut accepted: Vec<Arc<Host>> = Vec::with_capacity(hosts.len());

        for host in hosts {
            let checked = host.target().and_then(|target| {
                if accepted.iter().any(|h| h.target_str() == target.as_str()) {
                    Err(TurnstileError::DuplicateTarget {
                        target: target.to_string(),
                    })
                } else {
                    Ok(target)
                }
            });

            match checked {
                Ok(target) => {
                    tracing::debug!(target = %target, "adding host");
                    accepted.push(Arc::new(host));
                }
                Err(e) if options.lenient => {
                    tracing::warn!(error = %e, "skipping host");
                }
                Err(e) => return Err(e),
            }
        }

        Self::from_accepted(accepted, options)
    }

    /// Build a balancer by parsing each target with its host options.
    pub fn from_targets<I, S>(targets: I, options: BalancerOptions) -> Result<Self, TurnstileError>
    where
        I: IntoIterator<Item = (S, HostOptions)>,
        S: AsRef<str>,
    {
        let mut hosts = Vec::new();
        for (target, host_options) in targets {
            match Host::new(target.as_ref(), host_options) {
                Ok(host) => hosts.push(host),
                Err(e) if options.lenient => {
                    tracing::warn!(error = %e, "skipping host");
                }
                Err(e) => return Err(e),
            }
        }
        Self::new(hosts, options)
    }

    fn from_accepted(
        hosts: Vec<Arc<Host>>,
        options: BalancerOptions,
    ) -> Result<Self, TurnstileError> {
        if hosts.is_empty() {
            return Err(TurnstileError::EmptyPool);
        }

        if options.policy.failure_threshold == 0 {
            return Err(TurnstileError::InvalidPolicy {
                field: "failure_threshold",
                message: "must be at least 1".into(),
            });
        }

        let selector = options
            .selector
            .unwrap_or_else(|| Box::new(RoundRobin::new()));

        let balancer = Self {
            partitions: RwLock::new(Partitions {
                active: hosts.clone(),
                inactive: Vec::new(),
            }),
            hosts,
            selector,
            policy: options.policy,
        };

        tracing::debug!(state = %balancer, "balancer ready");
        Ok(balancer)
    }

    #[must_use]
    pub const fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    #[must_use]
    pub fn selector_name(&self) -> &'static str {
        self.selector.name()
    }

    /// Route one request to an active host.
    ///
    /// Answers `503` without consulting the selector when no host is active.
    pub async fn handle(&self, request: Request<Body>, client_ip: &str) -> Response<Body> {
        let correlation_id = request
            .headers()
            .get(&X_CORRELATION_ID)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        let host = match self.select() {
            Ok(host) => host,
            Err(e) => {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    error = %e,
                    "no host available"
                );
                return status::service_unavailable();
            }
        };

        tracing::debug!(
            correlation_id = %correlation_id,
            method = %request.method(),
            path = %request.uri().path(),
            target = %host.target_str(),
            "request routed"
        );

        let mut response = host.serve(request, client_ip, &correlation_id).await;

        if !host.active() && host.failures() >= self.policy.failure_threshold {
            self.demote(&host);
        }

        if let Ok(val) = HeaderValue::from_str(&correlation_id) {
            response.headers_mut().insert(X_CORRELATION_ID, val);
        }
        response
    }

    fn select(&self) -> Result<Arc<Host>, TurnstileError> {
        let partitions = self.partitions.read();
        if partitions.active.is_empty() {
            return Err(TurnstileError::NoHostsAvailable);
        }
        self.selector.select(&partitions.active)
    }

    /// Targets of the hosts currently in rotation, in configured order.
    pub fn targets(&self) -> Result<Vec<Url>, TurnstileError> {
        let partitions = self.partitions.read();
        partitions.active.iter().map(|h| h.target()).collect()
    }

    /// Targets of the hosts currently out of rotation.
    pub fn inactive_targets(&self) -> Result<Vec<Url>, TurnstileError> {
        let partitions = self.partitions.read();
        partitions.inactive.iter().map(|h| h.target()).collect()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.partitions.read().active.len()
    }

    #[must_use]
    pub fn inactive_count(&self) -> usize {
        self.partitions.read().inactive.len()
    }

    /// Look up a host by target. The target is normalized before comparing.
    #[must_use]
    pub fn host(&self, target: &str) -> Option<Arc<Host>> {
        let normalized = Url::parse(target).ok()?;
        self.hosts
            .iter()
            .find(|h| h.target_str() == normalized.as_str())
            .cloned()
    }

    /// Record a failure against `target` and take it out of rotation now.
    pub fn mark_inactive(&self, target: &str) -> Result<(), TurnstileError> {
        let host = self.lookup(target)?;
        host.mark_inactive();
        self.demote(&host);
        Ok(())
    }

    /// Fully recover `target` and put it back into rotation now.
    pub fn mark_healthy(&self, target: &str) -> Result<(), TurnstileError> {
        let host = self.lookup(target)?;
        host.mark_healthy();
        self.promote(&host);
        Ok(())
    }

    fn lookup(&self, target: &str) -> Result<Arc<Host>, TurnstileError> {
        self.host(target).ok_or_else(|| TurnstileError::UnknownHost {
            target: target.to_string(),
        })
    }

    /// Move `host` from `active` to `inactive`. Returns false if it was not active.
    pub fn demote(&self, host: &Arc<Host>) -> bool {
        let mut partitions = self.partitions.write();
        let Some(pos) = partitions.active.iter().position(|h| Arc::ptr_eq(h, host)) else {
            return false;
        };
        let removed = partitions.active.remove(pos);
        partitions.inactive.push(removed);
        let remaining = partitions.active.len();
        drop(partitions);

        tracing::warn!(
            target = %host.target_str(),
            failures = host.failures(),
            active = remaining,
            "host removed from rotation"
        );
        true
    }

    /// Move `host` from `inactive` back to `active` at its configured position.
    /// Returns false if it was not inactive.
    pub fn promote(&self, host: &Arc<Host>) -> bool {
        let mut partitions = self.partitions.write();
        let Some(pos) = partitions.inactive.iter().position(|h| Arc::ptr_eq(h, host)) else {
            return false;
        };
        partitions.inactive.remove(pos);

        let active: Vec<Arc<Host>> = self
            .hosts
            .iter()
            .filter(|h| Arc::ptr_eq(h, host) || partitions.active.iter().any(|a| Arc::ptr_eq(a, h)))
            .cloned()
            .collect();
        partitions.active = active;
        let count = partitions.active.len();
        drop(partitions);

        tracing::info!(
            target = %host.target_str(),
            failures = host.failures(),
            active = count,
            "host returned to rotation"
        );
        true
    }

    /// Inactive hosts whose revive timeout has elapsed at `now`.
    #[must_use]
    pub fn revive_candidates(&self, now: DateTime<Utc>) -> Vec<Arc<Host>> {
        self.partitions
            .read()
            .inactive
            .iter()
            .filter(|h| h.revive_due(self.policy.revive_timeout, now))
            .cloned()
            .collect()
    }

    /// A diagnostic snapshot of both partitions.
    #[must_use]
    pub fn state(&self) -> BalancerState {
        let partitions = self.partitions.read();
        let active: Vec<HostState> = partitions
            .active
            .iter()
            .map(|h| HostState::of(h, true))
            .collect();
        let inactive: Vec<HostState> = partitions
            .inactive
            .iter()
            .map(|h| HostState::of(h, false))
            .collect();
        drop(partitions);

        BalancerState {
            selector: self.selector.name().to_string(),
            pool: PoolState {
                hosts: active.len() + inactive.len(),
                active: PartitionState {
                    count: active.len(),
                    hosts: active,
                },
                inactive: PartitionState {
                    count: inactive.len(),
                    hosts: inactive,
                },
            },
        }
    }

    /// [`state`](Self::state) as JSON. Never fails: a serialization error
    /// is reported inside the returned document.
    #[must_use]
    pub fn state_json(&self) -> String {
        serde_json::to_string(&self.state()).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("failed to serialize balancer state: {e}") })
                .to_string()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostState {
    pub target: String,
    pub active: bool,
    pub failures: u32,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive_since: Option<DateTime<Utc>>,
    pub in_flight: usize,
}

impl HostState {
    fn of(host: &Host, in_rotation: bool) -> Self {
        let health = host.snapshot();
        let status = if !in_rotation {
            HealthStatus::Inactive
        } else if health.failures > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        Self {
            target: host.target_str().to_string(),
            active: health.active,
            failures: health.failures,
            status,
            inactive_since: health.inactive_since,
            in_flight: host.in_flight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionState {
    pub count: usize,
    pub hosts: Vec<HostState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
    pub hosts: usize,
    pub active: PartitionState,
    pub inactive: PartitionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerState {
    pub selector: String,
    pub pool: PoolState,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::StatusCode;

    use super::*;
    use crate::error::UpstreamError;
    use crate::proxy::transport::Transport;

    /// Answers 200 with the target authority, or fails when `down` is set.
    struct StubTransport {
        down: std::sync::atomic::AtomicBool,
        calls: AtomicUsize,
    }

    impl StubTransport {
        fn new(down: bool) -> Arc<Self> {
            Arc::new(Self {
                down: std::sync::atomic::AtomicBool::new(down),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn round_trip(
            &self,
            request: Request<Body>,
        ) -> Result<Response<Body>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(UpstreamError::Request {
                    source: "connection refused".into(),
                });
            }
            let authority = request.uri().authority().map(ToString::to_string);
            Ok(Response::new(Body::from(authority.unwrap_or_default())))
        }
    }

    /// Counts calls and delegates to round robin.
    struct CountingSelector {
        calls: Arc<AtomicUsize>,
        inner: RoundRobin,
    }

    impl Selector for CountingSelector {
        fn select(&self, hosts: &[Arc<Host>]) -> Result<Arc<Host>, TurnstileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.select(hosts)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn stub_balancer(targets: &[&str], policy: HealthPolicy) -> (Balancer, Vec<Arc<StubTransport>>) {
        let transports: Vec<_> = targets.iter().map(|_| StubTransport::new(false)).collect();
        let specs = targets.iter().zip(&transports).map(|(t, tr)| {
            let transport: Arc<dyn Transport> = tr.clone();
            (*t, HostOptions::default().with_transport(transport))
        });
        let balancer =
            Balancer::from_targets(specs, BalancerOptions::default().with_policy(policy)).unwrap();
        (balancer, transports)
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/ping").body(Body::empty()).unwrap()
    }

    #[test]
    fn empty_host_list_is_a_configuration_error() {
        let err = Balancer::new(Vec::new(), BalancerOptions::default()).unwrap_err();
        assert!(matches!(err, TurnstileError::EmptyPool));
        assert!(err.is_configuration());
    }

    #[test]
    fn strict_mode_rejects_one_bad_target() {
        let targets = [
            ("http://a:80", HostOptions::default()),
            ("::not-a-url::", HostOptions::default()),
        ];
        let err = Balancer::from_targets(targets, BalancerOptions::default()).unwrap_err();
        assert!(matches!(err, TurnstileError::InvalidTarget { .. }));
    }

    #[test]
    fn lenient_mode_skips_only_the_bad_target() {
        let targets = [
            ("http://a:80", HostOptions::default()),
            ("::not-a-url::", HostOptions::default()),
            ("http://b:80", HostOptions::default()),
        ];
        let balancer =
            Balancer::from_targets(targets, BalancerOptions::default().lenient(true)).unwrap();
        let targets: Vec<String> = balancer
            .targets()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(targets, vec!["http://a/", "http://b/"]);
    }

    #[test]
    fn lenient_mode_still_needs_one_host() {
        let targets = [("::not-a-url::", HostOptions::default())];
        let err = Balancer::from_targets(targets, BalancerOptions::default().lenient(true))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::EmptyPool));
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let targets = [
            ("http://a:8080", HostOptions::default()),
            ("http://a:8080/", HostOptions::default()),
        ];
        let err = Balancer::from_targets(targets, BalancerOptions::default()).unwrap_err();
        assert!(matches!(err, TurnstileError::DuplicateTarget { .. }));
    }

    #[test]
    fn zero_failure_threshold_is_rejected() {
        let policy = HealthPolicy {
            failure_threshold: 0,
            ..HealthPolicy::default()
        };
        let targets = [("http://a:80", HostOptions::default())];
        let err = Balancer::from_targets(targets, BalancerOptions::default().with_policy(policy))
            .unwrap_err();
        assert!(matches!(
            err,
            TurnstileError::InvalidPolicy {
                field: "failure_threshold",
                ..
            }
        ));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn routes_round_robin_in_configured_order() {
        let (balancer, _) = stub_balancer(
            &["http://a:8080", "http://b:8080", "http://c:8080"],
            HealthPolicy::default(),
        );

        let mut routed = Vec::new();
        for _ in 0..4 {
            let response = balancer.handle(request(), "10.0.0.1").await;
            let body = http_body_util::BodyExt::collect(response.into_body())
                .await
                .unwrap()
                .to_bytes();
            routed.push(String::from_utf8(body.to_vec()).unwrap());
        }

        assert_eq!(routed, vec!["a:8080", "b:8080", "c:8080", "a:8080"]);
        let targets: Vec<String> = balancer
            .targets()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            targets,
            vec!["http://a:8080/", "http://b:8080/", "http://c:8080/"]
        );
    }

    #[tokio::test]
    async fn out_of_band_inactive_host_leaves_rotation() {
        let (balancer, transports) =
            stub_balancer(&["http://a:8080", "http://b:8080"], HealthPolicy::default());

        balancer.mark_inactive("http://a:8080").unwrap();

        for _ in 0..3 {
            let response = balancer.handle(request(), "10.0.0.1").await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(transports[0].calls.load(Ordering::SeqCst), 0);
        assert_eq!(transports[1].calls.load(Ordering::SeqCst), 3);

        let targets = balancer.targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].as_str(), "http://b:8080/");
    }

    #[tokio::test]
    async fn empty_rotation_answers_503_without_selecting() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = CountingSelector {
            calls: Arc::clone(&calls),
            inner: RoundRobin::new(),
        };
        let targets = [
            ("http://a:80", HostOptions::default()),
            ("http://b:80", HostOptions::default()),
        ];
        let balancer = Balancer::from_targets(
            targets,
            BalancerOptions::default().with_selector(Box::new(selector)),
        )
        .unwrap();

        balancer.mark_inactive("http://a:80").unwrap();
        balancer.mark_inactive("http://b:80").unwrap();

        let response = balancer.handle(request(), "10.0.0.1").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(balancer.targets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_below_threshold_keep_host_in_rotation() {
        let policy = HealthPolicy {
            failure_threshold: 2,
            ..HealthPolicy::default()
        };
        let (balancer, transports) = stub_balancer(&["http://a:8080"], policy);
        transports[0].down.store(true, Ordering::SeqCst);

        let response = balancer.handle(request(), "10.0.0.1").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(balancer.active_count(), 1);
        assert_eq!(balancer.state().pool.active.hosts[0].status, HealthStatus::Degraded);

        let response = balancer.handle(request(), "10.0.0.1").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(balancer.active_count(), 0);
        assert_eq!(balancer.inactive_count(), 1);

        let response = balancer.handle(request(), "10.0.0.1").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn success_clears_degraded_host() {
        let (balancer, transports) = stub_balancer(&["http://a:8080"], HealthPolicy::default());
        transports[0].down.store(true, Ordering::SeqCst);
        balancer.handle(request(), "10.0.0.1").await;

        transports[0].down.store(false, Ordering::SeqCst);
        let response = balancer.handle(request(), "10.0.0.1").await;
        assert_eq!(response.status(), StatusCode::OK);

        let host = balancer.host("http://a:8080").unwrap();
        assert_eq!(host.failures(), 0);
        assert!(host.active());
    }

    #[test]
    fn promotion_restores_configured_order() {
        let (balancer, _) = stub_balancer(
            &["http://a:80", "http://b:80", "http://c:80"],
            HealthPolicy::default(),
        );

        balancer.mark_inactive("http://b:80").unwrap();
        balancer.mark_inactive("http://a:80").unwrap();
        balancer.mark_healthy("http://b:80").unwrap();
        balancer.mark_healthy("http://a:80").unwrap();

        let targets: Vec<String> = balancer
            .targets()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(targets, vec!["http://a/", "http://b/", "http://c/"]);
    }

    #[test]
    fn host_is_in_exactly_one_partition() {
        let (balancer, _) = stub_balancer(&["http://a:80", "http://b:80"], HealthPolicy::default());
        let host = balancer.host("http://a:80").unwrap();

        assert!(balancer.demote(&host));
        assert!(!balancer.demote(&host));
        assert_eq!(balancer.active_count() + balancer.inactive_count(), 2);

        assert!(balancer.promote(&host));
        assert!(!balancer.promote(&host));
        assert_eq!(balancer.active_count(), 2);
        assert_eq!(balancer.inactive_count(), 0);
    }

    #[test]
    fn unknown_host_is_reported() {
        let (balancer, _) = stub_balancer(&["http://a:80"], HealthPolicy::default());
        let err = balancer.mark_inactive("http://zzz:80").unwrap_err();
        assert!(matches!(err, TurnstileError::UnknownHost { .. }));
    }

    #[test]
    fn state_dump_reports_partitions() {
        let (balancer, _) = stub_balancer(&["http://a:80", "http://b:80"], HealthPolicy::default());
        balancer.mark_inactive("http://a:80").unwrap();

        let json: serde_json::Value = serde_json::from_str(&balancer.state_json()).unwrap();
        assert_eq!(json["selector"], "round_robin");
        assert_eq!(json["pool"]["hosts"], 2);
        assert_eq!(json["pool"]["active"]["count"], 1);
        assert_eq!(json["pool"]["inactive"]["count"], 1);

        let inactive = &json["pool"]["inactive"]["hosts"][0];
        assert_eq!(inactive["target"], "http://a/");
        assert_eq!(inactive["active"], false);
        assert_eq!(inactive["failures"], 1);
        assert_eq!(inactive["status"], "inactive");
        assert!(inactive["inactive_since"].is_string());

        let active = &json["pool"]["active"]["hosts"][0];
        assert_eq!(active["status"], "healthy");
        assert!(active.get("inactive_since").is_none());
    }

    #[tokio::test]
    async fn concurrent_requests_keep_partitions_consistent() {
        let policy = HealthPolicy {
            failure_threshold: 1,
            ..HealthPolicy::default()
        };
        let (balancer, transports) = stub_balancer(
            &["http://a:80", "http://b:80", "http://c:80", "http://d:80"],
            policy,
        );
        transports[1].down.store(true, Ordering::SeqCst);
        transports[3].down.store(true, Ordering::SeqCst);
        let balancer = Arc::new(balancer);

        let mut tasks = Vec::new();
        for _ in 0..64 {
            let balancer = Arc::clone(&balancer);
            tasks.push(tokio::spawn(async move {
                balancer.handle(request(), "10.0.0.1").await.status()
            }));
        }
        for task in tasks {
            let status = task.await.unwrap();
            assert!(status == StatusCode::OK || status == StatusCode::BAD_GATEWAY);
        }

        assert_eq!(balancer.active_count(), 2);
        assert_eq!(balancer.inactive_count(), 2);
        let targets: Vec<String> = balancer
            .targets()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(targets, vec!["http://a/", "http://c/"]);
    }
}
