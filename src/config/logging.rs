//! Logging configuration.
//!
//! `LOG_LEVEL` sets the level of this crate only; the HTTP stack and the
//! OpenTelemetry SDK stay at `warn`. `RUST_LOG` replaces the whole filter.

use super::parse::env_opt;
use super::ConfigError;

const CRATE_TARGET: &str = "tokio_http_otel";

/// Targets kept at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["hyper", "h2", "opentelemetry_sdk", "opentelemetry_otlp"];

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// `ctx.service` of every log line. Matches the OTel service name
    /// unless `SERVICE_NAME` overrides it.
    pub service_name: String,
}

impl LoggingConfig {
    /// Priority: `LOG_LEVEL` > `RUST_LOG` > `info`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let filter = resolve_filter(
            env_opt("LOG_LEVEL").as_deref(),
            env_opt("RUST_LOG").as_deref(),
        )?;
        let service_name = env_opt("SERVICE_NAME")
            .or_else(|| env_opt("OTEL_SERVICE_NAME"))
            .unwrap_or_else(|| CRATE_TARGET.to_string());

        Ok(Self {
            filter,
            service_name,
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: level_filter("info"),
            service_name: CRATE_TARGET.to_string(),
        }
    }
}

fn resolve_filter(log_level: Option<&str>, rust_log: Option<&str>) -> Result<String, ConfigError> {
    if let Some(level) = log_level {
        let level = level.to_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid {
                key: "LOG_LEVEL".into(),
                message: format!("'{}' is not one of {}", level, LEVELS.join(", ")),
            });
        }
        return Ok(level_filter(&level));
    }

    Ok(match rust_log {
        Some(filter) => filter.to_string(),
        None => level_filter("info"),
    })
}

fn level_filter(level: &str) -> String {
    let mut directives = vec![format!("{}={}", CRATE_TARGET, level)];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}
