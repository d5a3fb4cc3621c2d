//! Registry server configuration
//!
//! Everything comes from environment variables with sensible defaults,
//! so the binary runs with no flags in development.

use std::net::SocketAddr;
use std::time::Duration;

/// Registry server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("AGORA_REGISTRY_HOST", "0.0.0.0"),
            port: env_parse("AGORA_REGISTRY_PORT", 8000),
            sweep_interval: Duration::from_secs(env_parse("AGORA_SWEEP_INTERVAL_SECS", 5)),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
