//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! Provides file-based sources (YAML, JSON, TOML) gated by feature flags
//! and the [`parse_config_str`] helper for format-specific deserialization
//! of inline config text.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::ConfigVersion;
use crate::error::TurnstileError;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, TurnstileError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| TurnstileError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| TurnstileError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| TurnstileError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(TurnstileError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Parse, validate, and hash inline config text.
pub fn parse_validate_hash(
    ext: &str,
    content: &str,
    source_label: &str,
) -> Result<(Config, ConfigVersion), TurnstileError> {
    let config = parse_config_str(ext, content, source_label)?;

    if let Err(errors) = validate(&config) {
        return Err(TurnstileError::ConfigValidation { errors });
    }

    let hash = sha256_hex(content.as_bytes());
    Ok((config, ConfigVersion::Hash(hash)))
}
