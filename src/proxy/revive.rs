//! Background revival of inactive hosts.
//!
//! # Responsibilities
//! - Periodically find inactive hosts whose revive timeout has elapsed
//! - Probe each one through its own transport
//! - Promote hosts that answer; count failed probes for the rest
//! - Re-admit a host on trial once it has failed `revive_threshold` probes
//!
//! A trial host keeps its failure count, so a single further upstream
//! failure takes it out of rotation again.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::balancer::Balancer;
use super::host::Host;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub interval: Duration,
    pub path: String,
    pub method: Method,
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            path: "/".into(),
            method: Method::GET,
            timeout: Duration::from_secs(2),
        }
    }
}

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub revived: usize,
    pub readmitted: usize,
}

pub struct ReviveMonitor {
    balancer: Arc<Balancer>,
    probe: ProbeConfig,
}

impl ReviveMonitor {
    #[must_use]
    pub const fn new(balancer: Arc<Balancer>, probe: ProbeConfig) -> Self {
        Self { balancer, probe }
    }

    /// Sweep every `probe.interval` until `shutdown` changes or its sender drops.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_ms = self.probe.interval.as_millis() as u64,
            path = %self.probe.path,
            revive_timeout_ms = self.balancer.policy().revive_timeout.as_millis() as u64,
            "revive monitor starting"
        );

        let mut ticker = tokio::time::interval(self.probe.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(Utc::now()).await;
                }
                _ = shutdown.changed() => {
                    tracing::debug!("revive monitor shutting down");
                    return;
                }
            }
        }
    }

    /// Probe every host that is due at `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for host in self.balancer.revive_candidates(now) {
            report.probed += 1;
            if self.probe_host(&host).await {
                host.mark_healthy();
                self.balancer.promote(&host);
                report.revived += 1;
                continue;
            }

            let failed_probes = host.record_failed_probe();
            let threshold = self.balancer.policy().revive_threshold;
            if threshold > 0 && failed_probes >= threshold {
                tracing::info!(
                    target = %host.target_str(),
                    failed_probes,
                    "re-admitting host on trial"
                );
                host.mark_active();
                self.balancer.promote(&host);
                report.readmitted += 1;
            }
        }

        if report.probed > 0 {
            tracing::debug!(
                probed = report.probed,
                revived = report.revived,
                readmitted = report.readmitted,
                "revive sweep finished"
            );
        }
        report
    }

    async fn probe_host(&self, host: &Host) -> bool {
        match host
            .probe(&self.probe.method, &self.probe.path, self.probe.timeout)
            .await
        {
            Ok(status) if status.is_success() || status.is_redirection() => true,
            Ok(status) => {
                tracing::warn!(target = %host.target_str(), status = %status, "revive probe failed: non-success status");
                false
            }
            Err(e) => {
                tracing::warn!(target = %host.target_str(), error = %e, "revive probe failed");
                false
            }
        }
    }
}
