//! Configuration loading and validation.
//!
//! Defines the [`ConfigSource`] trait for pluggable config backends and
//! the [`ConfigVersion`] enum reported by the health endpoint.
//! Submodules provide the data model, validation logic, and the
//! file-backed source implementations.

pub mod model;
pub mod sources;
pub mod validation;

use std::path::Path;

use async_trait::async_trait;

use crate::error::TurnstileError;
use model::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<(Config, ConfigVersion), TurnstileError>;
}

/// Pick a file source for `path` based on its extension.
pub fn source_for_path(path: &Path) -> Result<Box<dyn ConfigSource>, TurnstileError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let path = path.to_path_buf();
    match ext.as_str() {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(sources::yaml::new(path))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(sources::json::new(path))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(sources::toml_source::new(path))),

        other => Err(TurnstileError::UnsupportedFormat(other.to_string())),
    }
}

/// Default file names tried, in order, when no `--config` is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "turnstile.yaml",
    "turnstile.yml",
    "turnstile.json",
    "turnstile.toml",
];

/// Resolve the config path: the explicit one, or the first default file present.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<std::path::PathBuf, TurnstileError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    DEFAULT_CONFIG_FILES
        .iter()
        .map(std::path::PathBuf::from)
        .find(|p| p.is_file())
        .ok_or_else(|| TurnstileError::NoConfigSource {
            hint: format!(
                "pass --config or create one of: {}",
                DEFAULT_CONFIG_FILES.join(", ")
            ),
        })
}
