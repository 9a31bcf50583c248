//! Instrumentation configuration: enable flag and route resolvers.
//!
//! Two sources are supported. [`InstrumentationConfig::from_env`] only looks
//! at the disable list, while the declarative form read by
//! [`InstrumentationConfig::from_json`] also describes route resolvers:
//!
//! ```json
//! {
//!   "enabled": true,
//!   "route_resolvers": [
//!     { "request_attribute": { "attribute": "route" } }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::parse::env_list;
use super::ConfigError;
use crate::route::{CompositeRouteResolver, RequestAttributeResolver, RouteResolver};

/// Identifier matched against the disable list.
pub const INSTRUMENTATION_NAME: &str = "tokio-http-server";

/// Comma separated list of disabled instrumentations.
pub const DISABLED_INSTRUMENTATIONS_ENV: &str = "OTEL_RUST_DISABLED_INSTRUMENTATIONS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Resolvers tried in order; the first route found wins.
    #[serde(default)]
    pub route_resolvers: Vec<RouteResolverConfig>,
}

fn default_enabled() -> bool {
    true
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            route_resolvers: Vec::new(),
        }
    }
}

/// A single configured route resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum RouteResolverConfig {
    /// Read the route from a named request attribute.
    RequestAttribute { attribute: String },
}

impl RouteResolverConfig {
    pub fn build(&self) -> Arc<dyn RouteResolver> {
        match self {
            RouteResolverConfig::RequestAttribute { attribute } => {
                Arc::new(RequestAttributeResolver::new(attribute.clone()))
            }
        }
    }
}

impl InstrumentationConfig {
    /// Load configuration from environment variables.
    ///
    /// The instrumentation is disabled when the disable list contains `all`
    /// or [`INSTRUMENTATION_NAME`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let disabled = env_list(DISABLED_INSTRUMENTATIONS_ENV).unwrap_or_default();
        Ok(Self {
            enabled: Self::enabled_with(&disabled),
            route_resolvers: Vec::new(),
        })
    }

    /// Whether the instrumentation survives the given disable list.
    pub fn enabled_with(disabled: &[String]) -> bool {
        !disabled
            .iter()
            .any(|name| name == "all" || name == INSTRUMENTATION_NAME)
    }

    /// Parse the declarative JSON form.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the declarative JSON form from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, resolver) in self.route_resolvers.iter().enumerate() {
            match resolver {
                RouteResolverConfig::RequestAttribute { attribute } if attribute.is_empty() => {
                    return Err(ConfigError::Invalid {
                        key: format!("route_resolvers[{}].request_attribute.attribute", i),
                        message: "must not be empty".into(),
                    });
                }
                RouteResolverConfig::RequestAttribute { .. } => {}
            }
        }
        Ok(())
    }

    /// Composite of the configured resolvers, in declared order.
    pub fn route_resolver(&self) -> CompositeRouteResolver {
        CompositeRouteResolver::new(self.route_resolvers.iter().map(|r| r.build()).collect())
    }
}
