//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as an empty host list, malformed or duplicate targets,
//! zero thresholds, and bad probe settings. Returns a list of
//! [`ValidationError`] values with per-field suggestions.

use std::collections::HashSet;

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Request methods accepted for revive probes: RFC 7231, RFC 5789, and WebDAV.
pub const METHODS: &[&str] = &[
    "GET",
    "HEAD",
    "POST",
    "PUT",
    "DELETE",
    "CONNECT",
    "OPTIONS",
    "TRACE",
    "PATCH",
    "PROPFIND",
    "PROPPATCH",
    "MKCOL",
    "COPY",
    "MOVE",
    "LOCK",
    "UNLOCK",
];

/// Validate a single target URL. Returns `Ok(())` or a human-readable error.
pub fn validate_target_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Validate an HTTP method string. Returns `Ok(())` or a human-readable error.
pub fn validate_method(method: &str) -> Result<(), String> {
    let upper = method.to_uppercase();
    if METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(format!("'{method}' is not a valid HTTP method"))
    }
}

fn error(scope: &str, field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        scope: scope.into(),
        field: field.into(),
        message: message.into(),
        suggestion: None,
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_health(config, &mut errors);

    if config.defaults.timeout == 0 {
        errors.push(error("defaults", "timeout", "timeout must be positive"));
    }

    if config.hosts.is_empty() {
        errors.push(error(
            "(root)",
            "hosts",
            "at least one host must be defined",
        ));
        return Err(errors);
    }

    let mut seen = HashSet::new();

    for (i, host) in config.hosts.iter().enumerate() {
        let scope = if host.target.is_empty() {
            format!("hosts[{i}]")
        } else {
            host.target.clone()
        };

        if !config.lenient {
            if let Err(msg) = validate_target_url(&host.target) {
                let suggestion = if !host.target.is_empty() && !host.target.contains("://") {
                    Some(format!("did you mean 'http://{}'?", host.target))
                } else {
                    None
                };
                errors.push(ValidationError {
                    suggestion,
                    ..error(&scope, "target", msg)
                });
            }

            // Compare normalized forms so `http://a` and `http://a/` collide.
            let key = Url::parse(&host.target)
                .map_or_else(|_| host.target.clone(), |u| u.to_string());
            if !seen.insert(key) {
                errors.push(error(&scope, "target", "duplicate host target"));
            }
        }

        if host.timeout == Some(0) {
            errors.push(error(&scope, "timeout", "timeout must be positive"));
        }

        if let Some(status) = host.error_status {
            if !(400..=599).contains(&status) {
                errors.push(error(
                    &scope,
                    "error_status",
                    format!("{status} is not a 4xx or 5xx status code"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_health(config: &Config, errors: &mut Vec<ValidationError>) {
    let health = &config.health;

    if health.failure_threshold == 0 {
        errors.push(ValidationError {
            suggestion: Some("use 1 to demote on the first failure".into()),
            ..error("health", "failure_threshold", "failure_threshold must be at least 1")
        });
    }
    if health.revive_timeout == 0 {
        errors.push(error("health", "revive_timeout", "revive_timeout must be positive"));
    }
    if health.probe_interval == 0 {
        errors.push(error("health", "probe_interval", "probe_interval must be positive"));
    }
    if health.probe_timeout == 0 {
        errors.push(error("health", "probe_timeout", "probe_timeout must be positive"));
    }
    if !health.probe_path.starts_with('/') {
        errors.push(ValidationError {
            suggestion: Some(format!("did you mean '/{}'?", health.probe_path)),
            ..error("health", "probe_path", "probe_path must start with '/'")
        });
    }
    if let Err(msg) = validate_method(&health.probe_method) {
        errors.push(error("health", "probe_method", msg));
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let health = &config.health;
    let mut lines = vec![
        format!(
            "  {} hosts, selector: {}{}\n",
            config.hosts.len(),
            config.selector.build().name(),
            if config.lenient { " (lenient)" } else { "" }
        ),
        format!(
            "  demote after {} failures, probe {} {} every {}ms after {}ms inactive\n",
            health.failure_threshold,
            health.probe_method.to_uppercase(),
            health.probe_path,
            health.probe_interval,
            health.revive_timeout,
        ),
    ];

    for host in &config.hosts {
        let timeout = host.timeout.map_or_else(
            || format!("{}ms (default)", config.defaults.timeout),
            |t| format!("{t}ms"),
        );
        lines.push(format!("  {}", host.target));
        lines.push(format!("    timeout: {timeout}"));
        if let Some(status) = host.error_status {
            lines.push(format!("    error status: {status}"));
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
