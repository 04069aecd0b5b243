//! # Resolver Configuration
//!
//! Process-wide defaults for the resolver, loaded from TOML:
//!
//! ```toml
//! timeout_ms = 30000
//! open_timeout_ms = 5000
//! default_page_size = 20
//! max_page_size = 1000
//! concurrent = true
//! ```
//!
//! Every key is optional. Per-resource settings (endpoint timeouts, a
//! resource's own page size cap) take precedence over these values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Total time allowed for one remote call.
    pub timeout_ms: u64,
    /// Time allowed to establish the connection of a remote call.
    pub open_timeout_ms: u64,
    /// Root page size when neither the request nor the resource sets one.
    pub default_page_size: u64,
    /// Largest page size any request may ask for.
    pub max_page_size: u64,
    /// Resolve sibling relationships concurrently.
    pub concurrent: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            open_timeout_ms: 5_000,
            default_page_size: 20,
            max_page_size: 1_000,
            concurrent: true,
        }
    }
}

impl ResolverConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 || self.open_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid("default_page_size must be positive".into()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }
}
