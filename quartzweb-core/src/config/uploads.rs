//! Upload temp-storage configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Directory receiving multipart file parts
    /// Env: QW_TEMP_DIR
    /// Default: "TempSessionData"
    pub temp_dir: PathBuf,

    /// Empty the temp directory when the server starts
    /// Env: QW_CLEAR_TEMP_ON_STARTUP
    /// Default: false
    pub clear_on_startup: bool,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self { temp_dir: PathBuf::from("TempSessionData"), clear_on_startup: false }
    }
}

impl UploadsConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(dir) = env::var("QW_TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }

        if let Ok(clear) = env::var("QW_CLEAR_TEMP_ON_STARTUP") {
            self.clear_on_startup = clear.parse().unwrap_or(false);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.temp_dir.as_os_str().is_empty() {
            bail!("Invalid temp_dir: cannot be empty");
        }
        Ok(())
    }
}
