//! Configuration module for tokio_http_otel.
//!
//! Every section loads from environment variables. The instrumentation
//! section additionally has a declarative JSON form.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_http_otel::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! ```

mod error;
mod http;
mod instrumentation;
mod logging;
mod parse;
mod server;

pub use self::http::{HttpConfig, HttpServerConfig, DEFAULT_KNOWN_METHODS};
pub use error::ConfigError;
pub use instrumentation::{
    InstrumentationConfig, RouteResolverConfig, DISABLED_INSTRUMENTATIONS_ENV,
    INSTRUMENTATION_NAME,
};
pub use logging::LoggingConfig;
pub(crate) use parse::{env_bool, env_duration, env_or, env_parse};
pub use server::ServerConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub instrumentation: InstrumentationConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            instrumentation: InstrumentationConfig::from_env()?,
            http: HttpConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);

        if !self.server.trusted_proxies.is_empty() {
            info!("  Trusted proxies: {:?}", self.server.trusted_proxies);
        }

        match self.server.drain_timeout {
            Some(timeout) => info!("  Drain timeout: {}s", timeout.as_secs()),
            None => info!("  Drain timeout: unbounded"),
        }

        if self.instrumentation.enabled {
            info!(
                "  Instrumentation: enabled ({} route resolvers)",
                self.instrumentation.route_resolvers.len()
            );
        } else {
            info!("  Instrumentation: disabled");
        }

        if !self.http.request_captured_headers.is_empty() {
            info!(
                "  Captured request headers: {}",
                self.http.request_captured_headers.join(", ")
            );
        }

        if !self.http.response_captured_headers.is_empty() {
            info!(
                "  Captured response headers: {}",
                self.http.response_captured_headers.join(", ")
            );
        }
    }
}
