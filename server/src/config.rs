//! # Server Configuration
//!
//! Loaded from the environment (and a `.env` file, if present) with the
//! `SKAIA` prefix and `__` as separator:
//!
//! - `SKAIA__HOST=127.0.0.1`
//! - `SKAIA__PORT=9000`
//! - `SKAIA__CLIENT_QUEUE_CAPACITY=512`
//!
//! The bare `PORT` variable, if set, overrides the port.

use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("client queue capacity must be greater than zero")]
    InvalidQueueCapacity,

    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Outbound frames buffered per client before it is evicted as too slow.
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_client_queue_capacity() -> usize {
    256
}

fn default_log_filter() -> String {
    "skaia_server=info,skaia_client=info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_queue_capacity: default_client_queue_capacity(),
            log_filter: default_log_filter(),
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config: ServerConfig = config::Config::builder()
            .add_source(config::Environment::default().prefix("SKAIA").separator("__"))
            .build()?
            .try_deserialize()?;

        config.apply_port_override(std::env::var("PORT").ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_port_override(&mut self, port: Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = port {
            self.port = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }
}
