//! Configuration system for QuartzWeb
//!
//! # Configuration Hierarchy
//!
//! Configuration values are resolved in the following order (highest priority wins):
//!
//! 1. **Environment Variables** (`QW_*`) - Override file config
//! 2. **Config File** (quartzweb.toml) - Override defaults
//! 3. **Defaults** - Lowest priority
//!
//! Embedders may still adjust the loaded struct in code before handing it to
//! the server.
//!
//! # Example
//!
//! ```no_run
//! use quartzweb_core::config::QuartzConfig;
//!
//! // Load with full supersedence
//! let config = QuartzConfig::load()?;
//!
//! // Or load from specific file
//! let config = QuartzConfig::from_file("quartzweb.toml")?;
//!
//! // Or use defaults
//! let config = QuartzConfig::default();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod logging;
pub mod server;
pub mod uploads;

pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use uploads::UploadsConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "quartzweb.toml";

/// Complete QuartzWeb configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuartzConfig {
    /// Listener and request limits
    pub server: ServerConfig,

    /// Multipart upload storage
    pub uploads: UploadsConfig,

    /// Log output
    pub logging: LoggingConfig,
}

impl QuartzConfig {
    /// Load configuration with full supersedence
    ///
    /// Order: Defaults → quartzweb.toml → Environment Variables
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file with env var override
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::default();

        if path.as_ref().exists() {
            let file_config = Self::from_file(&path)?;
            config.merge(file_config);
        }

        config.apply_env_vars();

        Ok(config)
    }

    /// Load configuration from a TOML file only, without env overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.server.merge(other.server);
        self.uploads.merge(other.uploads);
        self.logging.merge(other.logging);
    }

    /// Apply environment variable overrides
    pub fn apply_env_vars(&mut self) {
        self.server.apply_env_vars();
        self.uploads.apply_env_vars();
        self.logging.apply_env_vars();
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.server.validate().context("Invalid [server] configuration")?;
        self.uploads.validate().context("Invalid [uploads] configuration")?;
        self.logging.validate().context("Invalid [logging] configuration")?;
        Ok(())
    }

    /// Render as TOML, e.g. to bootstrap a config file
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
