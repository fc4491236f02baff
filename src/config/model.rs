//! Serde data structures for the Turnstile configuration file.
//!
//! Contains [`Config`] (the root), [`Defaults`], [`HealthConfig`], and
//! [`HostEntry`]. All types derive `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::proxy::balancer::HealthPolicy;
use crate::proxy::headers::HeaderPolicy;
use crate::proxy::revive::ProbeConfig;
use crate::proxy::selector::SelectorKind;

const fn default_timeout() -> u64 {
    5000
}

const fn default_true() -> bool {
    true
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_revive_timeout() -> u64 {
    30_000
}

const fn default_revive_threshold() -> u32 {
    3
}

const fn default_probe_interval() -> u64 {
    5000
}

const fn default_probe_timeout() -> u64 {
    2000
}

fn default_probe_path() -> String {
    "/".to_string()
}

fn default_probe_method() -> String {
    "GET".to_string()
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_default_selector(v: &SelectorKind) -> bool {
    *v == SelectorKind::default()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "is_default_selector")]
    pub selector: SelectorKind,

    /// Skip invalid or duplicate hosts with a warning instead of failing.
    #[serde(default, skip_serializing_if = "is_false")]
    pub lenient: bool,

    #[serde(default, skip_serializing_if = "Defaults::is_default")]
    pub defaults: Defaults,

    #[serde(default, skip_serializing_if = "HealthConfig::is_default")]
    pub health: HealthConfig,

    pub hosts: Vec<HostEntry>,
}

impl Config {
    /// Upstream timeout for `host`, falling back to the global default.
    #[must_use]
    pub fn host_timeout(&self, host: &HostEntry) -> Duration {
        Duration::from_millis(host.timeout.unwrap_or(self.defaults.timeout))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub forward_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub proxy_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub strip_hop_by_hop: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            forward_headers: default_true(),
            proxy_headers: default_true(),
            strip_hop_by_hop: default_true(),
        }
    }
}

impl Defaults {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub const fn header_policy(&self) -> HeaderPolicy {
        HeaderPolicy {
            forward_headers: self.forward_headers,
            proxy_headers: self.proxy_headers,
            strip_hop_by_hop: self.strip_hop_by_hop,
        }
    }
}

/// Passive demotion and revive probing. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_revive_timeout")]
    pub revive_timeout: u64,

    #[serde(default = "default_revive_threshold")]
    pub revive_threshold: u32,

    #[serde(default = "default_probe_interval")]
    pub probe_interval: u64,

    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    #[serde(default = "default_probe_method")]
    pub probe_method: String,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            revive_timeout: default_revive_timeout(),
            revive_threshold: default_revive_threshold(),
            probe_interval: default_probe_interval(),
            probe_path: default_probe_path(),
            probe_method: default_probe_method(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl HealthConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub const fn policy(&self) -> HealthPolicy {
        HealthPolicy {
            failure_threshold: self.failure_threshold,
            revive_timeout: Duration::from_millis(self.revive_timeout),
            revive_threshold: self.revive_threshold,
        }
    }

    /// Probe settings. An unparseable method falls back to `GET`;
    /// validation rejects those before this is reached.
    #[must_use]
    pub fn probe(&self) -> ProbeConfig {
        ProbeConfig {
            interval: Duration::from_millis(self.probe_interval),
            path: self.probe_path.clone(),
            method: self
                .probe_method
                .to_uppercase()
                .parse()
                .unwrap_or(axum::http::Method::GET),
            timeout: Duration::from_millis(self.probe_timeout),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostEntry {
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Status returned instead of 502/504 when this host fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_status: Option<u16>,
}
