//! Turnstile is an HTTP reverse-proxy load balancer.
//!
//! It accepts inbound HTTP requests and forwards each one to a single
//! backend host chosen by a pluggable selection policy. Hosts that keep
//! failing are moved out of rotation and probed in the background until
//! they recover.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Configuration loading and validation via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- Admin endpoints reporting pool health and state.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Hosts, selectors, the balancer, and the revive monitor.
//! - [`server`] -- Axum server setup, shared application state, and
//!   graceful shutdown.
//!
//! # Embedding
//!
//! ```no_run
//! use turnstile::proxy::balancer::{Balancer, BalancerOptions};
//! use turnstile::proxy::host::HostOptions;
//!
//! let balancer = Balancer::from_targets(
//!     [
//!         ("http://10.0.0.1:8080", HostOptions::default()),
//!         ("http://10.0.0.2:8080", HostOptions::default()),
//!     ],
//!     BalancerOptions::default(),
//! )?;
//! # Ok::<(), turnstile::error::TurnstileError>(())
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
