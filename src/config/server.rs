//! Reference server configuration.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use super::parse::{env_duration, env_list, env_or};
use super::ConfigError;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Proxies whose forwarding headers are trusted.
    pub trusted_proxies: Vec<IpAddr>,
    /// How long to wait for open connections on shutdown. `None` waits forever.
    pub drain_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_str = env_or("LISTEN_ADDR", "0.0.0.0:8080");
        let listen_addr = listen_str.parse().map_err(|e| ConfigError::Parse {
            key: "LISTEN_ADDR".into(),
            value: listen_str.clone(),
            error: format!("{}", e),
        })?;

        let trusted_proxies = env_list("TRUSTED_PROXIES")
            .unwrap_or_default()
            .into_iter()
            .map(|value| {
                value.parse().map_err(|e| ConfigError::Parse {
                    key: "TRUSTED_PROXIES".into(),
                    value,
                    error: format!("{}", e),
                })
            })
            .collect::<Result<Vec<IpAddr>, _>>()?;

        Ok(Self {
            listen_addr,
            trusted_proxies,
            drain_timeout: env_duration("DRAIN_TIMEOUT", "30s")?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            trusted_proxies: Vec::new(),
            drain_timeout: Some(Duration::from_secs(30)),
        }
    }
}
