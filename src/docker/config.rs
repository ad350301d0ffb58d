//! Registry credential configuration.
//!
//! Holds the per-registry credential store consulted before pulls. Custom
//! registries are matched by the hostname prefix of the image reference;
//! images without a registry host fall back to the public hub entry.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Registry used when an image reference carries no hostname.
pub const DOCKER_HUB: &str = "hub.docker.com";

static IMAGE_WITH_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:[a-z0-9]+(?:-[a-z0-9]+)*\.)+[a-z]{2,})/.+").unwrap()
});

/// Credentials for one registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// Login user
    pub username: String,
    /// Login password or token
    pub password: String,
}

/// Credentials resolved for one image pull.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    /// Registry hostname the credentials belong to
    pub registry: String,
    /// Login user
    pub username: String,
    /// Login password or token
    pub password: String,
}

/// Configuration for the docker layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Registry credential store, keyed by registry hostname
    #[serde(default)]
    pub registries: HashMap<String, RegistryAuth>,
}

/// Errors loading the docker configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("can't read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl DockerConfig {
    /// Load the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Resolve credentials for an image reference.
    ///
    /// A custom registry is matched by hostname prefix; references without a
    /// hostname use the [`DOCKER_HUB`] entry. Returns `None` when the store
    /// has no matching entry.
    pub fn credentials_for(&self, image: &str) -> Option<ResolvedCredentials> {
        let registry = match IMAGE_WITH_HOST.captures(image) {
            Some(captures) => {
                let host = captures.get(1)?.as_str();
                if self.registries.contains_key(host) {
                    host
                } else {
                    return None;
                }
            }
            None => {
                if self.registries.contains_key(DOCKER_HUB) {
                    DOCKER_HUB
                } else {
                    return None;
                }
            }
        };

        let stored = &self.registries[registry];
        debug!("Using credentials for {} as {}", registry, stored.username);
        Some(ResolvedCredentials {
            registry: registry.to_string(),
            username: stored.username.clone(),
            password: stored.password.clone(),
        })
    }
}
