//! Generic async file-based config source with SHA-256 versioning.
//!
//! [`FileSource`] implements [`ConfigSource`] for any file format by
//! accepting a deserialization function at construction time. It reads
//! the file asynchronously via Tokio, validates the result, and hashes
//! the raw content for the version reported by the health endpoint.

use std::path::PathBuf;

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::TurnstileError;

type Deserializer = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: Deserializer,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: Deserializer) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    async fn read_content(&self) -> Result<String, TurnstileError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TurnstileError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                TurnstileError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), TurnstileError> {
        let content = self.read_content().await?;

        let config = (self.deserialize)(&content).map_err(|e| TurnstileError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        if let Err(errors) = validate(&config) {
            return Err(TurnstileError::ConfigValidation { errors });
        }

        let hash = sha256_hex(content.as_bytes());
        tracing::debug!(path = %self.path.display(), version = %hash, "config loaded");
        Ok((config, ConfigVersion::Hash(hash)))
    }
}
