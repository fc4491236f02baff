//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`.
//!
//! With the `sentry-integration` feature, a `sentry-tracing` layer
//! forwards warnings as breadcrumbs and errors as events.

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// The filter for `level`, with connection-level noise from hyper capped at `warn`.
#[must_use]
pub fn filter(level: &LogLevel) -> Targets {
    let tracing_level = level.to_tracing_level();
    let hyper_level = tracing_level.min(tracing::Level::WARN);
    Targets::new()
        .with_default(tracing_level)
        .with_target("hyper", hyper_level)
        .with_target("hyper_util", hyper_level)
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let filter = filter(level);

    #[cfg(feature = "sentry-integration")]
    let registry = tracing_subscriber::registry().with(sentry_tracing::layer());
    #[cfg(not(feature = "sentry-integration"))]
    let registry = tracing_subscriber::registry();

    match format {
        LogFormat::Json => {
            registry
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            registry.with(filter).with(fmt::layer().pretty()).init();
        }
    }
}
