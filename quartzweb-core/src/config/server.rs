//! Server configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::http::{DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_LINE_LENGTH, DEFAULT_PORT, DEFAULT_READ_BUFFER_SIZE};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listening address
    /// Env: QW_HOST
    /// Default: "0.0.0.0"
    pub host: String,

    /// Server listening port
    /// Env: QW_PORT
    /// Default: 8000
    pub port: u16,

    /// Maximum accepted Content-Length in bytes
    /// Env: QW_MAX_BODY_SIZE
    /// Default: 101000000 (~101MB)
    pub max_body_size: u64,

    /// Initial per-connection read buffer in bytes
    /// Env: QW_READ_BUFFER_SIZE
    /// Default: 16384
    pub read_buffer_size: usize,

    /// Longest request line or header line in bytes
    /// Env: QW_MAX_LINE_LENGTH
    /// Default: 8192
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.host = other.host;
        self.port = other.port;
        self.max_body_size = other.max_body_size;
        self.read_buffer_size = other.read_buffer_size;
        self.max_line_length = other.max_line_length;
    }

    /// Apply environment variables
    pub fn apply_env_vars(&mut self) {
        if let Ok(host) = env::var("QW_HOST") {
            self.host = host;
        }

        if let Ok(port) = env::var("QW_PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }

        if let Ok(size) = env::var("QW_MAX_BODY_SIZE") {
            if let Ok(s) = size.parse() {
                self.max_body_size = s;
            }
        }

        if let Ok(size) = env::var("QW_READ_BUFFER_SIZE") {
            if let Ok(s) = size.parse() {
                self.read_buffer_size = s;
            }
        }

        if let Ok(length) = env::var("QW_MAX_LINE_LENGTH") {
            if let Ok(l) = length.parse() {
                self.max_line_length = l;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("Invalid port: port must be between 1 and 65535");
        }

        if self.host.is_empty() {
            bail!("Invalid host: host cannot be empty");
        }

        if self.max_body_size == 0 {
            bail!("Invalid max_body_size: must be greater than 0");
        }

        if self.read_buffer_size == 0 {
            bail!("Invalid read_buffer_size: must be greater than 0");
        }

        if self.max_line_length == 0 {
            bail!("Invalid max_line_length: must be greater than 0");
        }

        Ok(())
    }
}
