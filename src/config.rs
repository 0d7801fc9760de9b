//! Configuration module for Keysieve
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all optional values. CLI flags override the
//! file; the key pattern is the only setting without a default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use regex::Regex;

use crate::error::{ProxyError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream master configuration
    pub master: MasterConfig,

    /// Listener configuration
    pub proxy: ListenConfig,

    /// Key filter configuration
    pub filter: FilterConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ProxyError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.master.port == 0 {
            return Err(ProxyError::Config("Master port cannot be 0".to_string()));
        }

        if self.proxy.port == 0 {
            return Err(ProxyError::Config("Proxy port cannot be 0".to_string()));
        }

        if self.filter.key_pattern.is_empty() {
            return Err(ProxyError::Config(
                "A key pattern is required; pass it as the positional argument".to_string(),
            ));
        }

        Regex::new(&self.filter.key_pattern).map_err(|e| {
            ProxyError::Config(format!(
                "Wrong format of regular expression '{}': {}",
                self.filter.key_pattern, e
            ))
        })?;

        Ok(())
    }

    /// The master's `host:port` dial string
    pub fn master_addr(&self) -> String {
        self.master.address()
    }

    /// The listener's `host:port` bind string
    pub fn proxy_addr(&self) -> String {
        self.proxy.address()
    }
}

/// Upstream master configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Master host
    pub host: String,

    /// Master port
    pub port: u16,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
        }
    }
}

impl MasterConfig {
    /// Get the full master address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Bind address; empty means all interfaces
    pub bind: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind: String::new(),
            port: 6380,
        }
    }
}

impl ListenConfig {
    /// Get the full bind address
    pub fn address(&self) -> String {
        let bind = if self.bind.is_empty() {
            "0.0.0.0"
        } else {
            &self.bind
        };
        format!("{}:{}", bind, self.port)
    }
}

/// Key filter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Regular expression; keys whose name has a match are admitted
    pub key_pattern: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,

    /// JSON format
    Json,
}
