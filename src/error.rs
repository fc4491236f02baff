//! Unified error types for Turnstile.
//!
//! Defines [`TurnstileError`] (the main crate error enum),
//! [`ValidationError`] for config validation failures, and
//! [`UpstreamError`] for failures while forwarding to a backend.
//! All use `thiserror` or a hand-written `Display`. Error messages
//! include contextual hints to guide the user toward a fix.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub scope: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.scope, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TurnstileError {
    #[error("At least one host must be provided")]
    EmptyPool,

    #[error("Invalid host target '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported scheme '{scheme}' for host target '{target}' (expected http or https)")]
    UnsupportedScheme { target: String, scheme: String },

    #[error("Duplicate host target '{target}'")]
    DuplicateTarget { target: String },

    #[error("Invalid health policy: {field} {message}")]
    InvalidPolicy {
        field: &'static str,
        message: String,
    },

    #[error("No hosts available")]
    NoHostsAvailable,

    #[error("Unknown host target '{target}'")]
    UnknownHost { target: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

impl TurnstileError {
    /// Whether this error was raised while building the pool from configuration.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyPool
                | Self::InvalidTarget { .. }
                | Self::UnsupportedScheme { .. }
                | Self::DuplicateTarget { .. }
                | Self::InvalidPolicy { .. }
        )
    }
}

/// A failure while forwarding a request to a single backend host.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UpstreamError {
    #[error("upstream timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("failed to build upstream request: {0}")]
    InvalidRequest(String),

    #[error("upstream request failed: {source}")]
    Request {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl UpstreamError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
