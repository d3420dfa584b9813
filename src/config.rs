use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::store::StoreConfig;

/// Engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Store backend: "in_memory" or "redb"
    #[serde(default = "default_store_backend")]
    pub store_backend: String,

    /// Database file path for the redb backend
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Webhook verification public key, base64-encoded SPKI DER.
    /// Absent means the signature gate runs in accept-and-warn mode.
    #[serde(default)]
    pub webhook_verification_key: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            store_backend: default_store_backend(),
            store_path: default_store_path(),
            webhook_verification_key: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables and config files
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("engage").required(false))
            // Override with environment variables
            .add_source(config::Environment::with_prefix("ENGAGE").separator("__"));

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }

    /// Resolve the configured store backend.
    pub fn store_config(&self) -> anyhow::Result<StoreConfig> {
        match self.store_backend.as_str() {
            "in_memory" => Ok(StoreConfig::in_memory()),
            "redb" => Ok(StoreConfig::redb(self.store_path.clone())),
            other => anyhow::bail!("Unknown store backend: {other}"),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_backend() -> String {
    "in_memory".to_string()
}

fn default_store_path() -> String {
    "engage.redb".to_string()
}
