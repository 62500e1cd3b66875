//! Application configuration
//!
//! Contains the configuration structures for the Hermes binary and the
//! loader that layers embedded defaults, config files and environment.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use hermes_core::pubsub::{DEFAULT_BUFFER_SIZE, DEFAULT_CHANNEL};
use hermes_core::HubConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedded default configuration (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// URL selecting the in-process broker
pub const MEMORY_URL: &str = "memory://";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub redis: RedisConfig,
    #[serde(default)]
    pub pubsub: PubsubConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl RedisConfig {
    /// Whether the in-process broker was requested
    pub fn is_memory(&self) -> bool {
        self.url.starts_with(MEMORY_URL)
    }
}

/// Pub/sub configuration (exposed to TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubsubConfig {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub publish_timeout_ms: Option<u64>,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_query_timeout_ms() -> u64 {
    5000
}

impl Default for PubsubConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            buffer_size: default_buffer_size(),
            publish_timeout_ms: None,
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl PubsubConfig {
    /// Convert to the library's hub configuration
    pub fn to_hub_config(&self) -> HubConfig {
        let config = HubConfig::default()
            .with_channel(self.channel.clone())
            .with_buffer_size(self.buffer_size)
            .with_query_timeout(Duration::from_millis(self.query_timeout_ms));

        match self.publish_timeout_ms {
            Some(ms) => config.with_publish_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("HERMES_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        // 3. Environment variables (highest priority), e.g. HERMES_REDIS__URL
        .add_source(
            Environment::with_prefix("HERMES")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
