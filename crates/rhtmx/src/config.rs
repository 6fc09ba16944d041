// File: src/config.rs
// Purpose: Configuration parsing from rhtml.toml

use anyhow::{Context, Result};
use rhtmx_loader::LoaderTomlConfig;
use rhtmx_router::TableOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub loader: LoaderTomlConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingConfig {
    /// Compare static segments ignoring ASCII case (default: false)
    #[serde(default = "default_false")]
    pub case_insensitive: bool,

    /// Percent-decode route parameters (default: true)
    #[serde(default = "default_true")]
    pub decode_params: bool,
}

/// Error and fallback response configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Put the error chain in 500 bodies (development only)
    #[serde(default = "default_false")]
    pub expose_errors: bool,

    /// Body of the built-in 404 response
    #[serde(default = "default_not_found_body")]
    pub not_found_body: String,
}

// Default values
fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_not_found_body() -> String {
    "Not Found".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            decode_params: true,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            expose_errors: false,
            not_found_body: default_not_found_body(),
        }
    }
}

impl RoutingConfig {
    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            case_insensitive: self.case_insensitive,
            decode_params: self.decode_params,
        }
    }
}

impl ServerConfig {
    /// `host:port`, ready for a TCP listener
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from rhtml.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist or is empty, return default config
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./rhtml.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("rhtml.toml")
    }
}
