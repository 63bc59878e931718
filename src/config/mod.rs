//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `OVERLAY_` prefix; every setting is a flat key.
//!
//! # Example
//!
//! ```no_run
//! use overlay_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Relay listening on {}", config.listen_addr());
//! ```

mod error;

pub use error::{ConfigError, ValidationError};

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::rate_limiter::RateLimitConfig;

const ENV_PREFIX: &str = "OVERLAY";

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub ws_host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub ws_port: u16,

    /// Shared secret clients present as `?token=`. Unset rejects everyone.
    #[serde(default)]
    pub ws_token: Option<String>,

    /// Messages allowed per client per 60 second window
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Where the shared state snapshot is persisted
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Frames queued per connection before broadcasts are dropped for it
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// How long shutdown waits for connections to close
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `OVERLAY_` prefix
    /// 3. Deserializes into the typed configuration struct
    ///
    /// # Environment Variable Format
    ///
    /// - `OVERLAY_WS_PORT=9000` -> `ws_port = 9000`
    /// - `OVERLAY_RATE_LIMIT=10` -> `rate_limit = 10`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit variable map instead of the
    /// process environment.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn from_environment(source: config::Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ws_host.trim().is_empty() {
            return Err(ValidationError::InvalidHost(self.ws_host.clone()));
        }
        if self.ws_port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.rate_limit == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        if self.outbound_buffer == 0 {
            return Err(ValidationError::InvalidOutboundBuffer);
        }
        if self.config_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("OVERLAY_CONFIG_PATH"));
        }
        Ok(())
    }

    /// `host:port` string to bind the listener to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    /// The configured token, with an empty value treated as unset.
    pub fn token(&self) -> Option<&str> {
        self.ws_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Per-client message budget.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::per_minute(self.rate_limit)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_host: default_host(),
            ws_port: default_port(),
            ws_token: None,
            rate_limit: default_rate_limit(),
            config_path: default_config_path(),
            outbound_buffer: default_outbound_buffer(),
            shutdown_grace_secs: default_shutdown_grace(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_rate_limit() -> u32 {
    60
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_outbound_buffer() -> usize {
    128
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_log_level() -> String {
    "info,overlay_relay=debug".to_string()
}
