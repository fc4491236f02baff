//! Host selection policies.
//!
//! A [`Selector`] picks one host from the slice of currently active
//! hosts it is handed. Selectors never look at health state; the
//! balancer only ever passes hosts that are in rotation.
//!
//! The round-robin cursor indexes whatever slice is passed on each
//! call, so a host's share of traffic is not stable across pool
//! membership changes.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::host::Host;
use crate::error::TurnstileError;

pub trait Selector: Send + Sync {
    /// Choose one host. Fails with [`TurnstileError::NoHostsAvailable`] on an empty slice.
    fn select(&self, hosts: &[Arc<Host>]) -> Result<Arc<Host>, TurnstileError>;

    fn name(&self) -> &'static str;
}

/// Built-in selection policies, addressable by name from config and CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    #[default]
    RoundRobin,
    Random,
    LeastConnections,
}

impl SelectorKind {
    #[must_use]
    pub fn build(self) -> Box<dyn Selector> {
        match self {
            Self::RoundRobin => Box::new(RoundRobin::new()),
            Self::Random => Box::new(Random),
            Self::LeastConnections => Box::new(LeastConnections),
        }
    }
}

/// Rotates through hosts one position per call.
#[derive(Debug, Default)]
pub struct RoundRobin {
    // None until the first selection, so the first call lands on index 0.
    cursor: Mutex<Option<usize>>,
}

impl RoundRobin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn select(&self, hosts: &[Arc<Host>]) -> Result<Arc<Host>, TurnstileError> {
        if hosts.is_empty() {
            return Err(TurnstileError::NoHostsAvailable);
        }

        let mut cursor = self.cursor.lock();
        let next = cursor.map_or(0, |c| (c + 1) % hosts.len());
        *cursor = Some(next);
        drop(cursor);

        tracing::trace!(index = next, "selected host");
        hosts.get(next).cloned().ok_or(TurnstileError::NoHostsAvailable)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// Uniformly random choice.
#[derive(Debug, Default)]
pub struct Random;

impl Selector for Random {
    fn select(&self, hosts: &[Arc<Host>]) -> Result<Arc<Host>, TurnstileError> {
        if hosts.is_empty() {
            return Err(TurnstileError::NoHostsAvailable);
        }
        let index = rand::thread_rng().gen_range(0..hosts.len());
        hosts.get(index).cloned().ok_or(TurnstileError::NoHostsAvailable)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Picks the host with the fewest in-flight requests.
/// Ties go to the earliest host in the slice.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl Selector for LeastConnections {
    fn select(&self, hosts: &[Arc<Host>]) -> Result<Arc<Host>, TurnstileError> {
        hosts
            .iter()
            .min_by_key(|h| h.in_flight())
            .cloned()
            .ok_or(TurnstileError::NoHostsAvailable)
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}
