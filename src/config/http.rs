//! HTTP semantic-convention settings shared by the tracing and metrics
//! handlers.

use http::Method;

use super::parse::{env_bool, env_list};
use super::ConfigError;

/// Methods reported as-is. Anything else becomes `_OTHER`.
pub const DEFAULT_KNOWN_METHODS: [&str; 9] = [
    "CONNECT", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT", "TRACE",
];

/// Opt-in span attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpServerConfig {
    pub capture_request_body_size: bool,
    pub capture_response_body_size: bool,
    pub capture_network_local_address: bool,
    pub capture_network_local_port: bool,
    pub capture_network_transport: bool,
    pub capture_client_port: bool,
}

impl HttpServerConfig {
    pub fn from_env() -> Self {
        const PREFIX: &str = "OTEL_INSTRUMENTATION_HTTP_SERVER_CAPTURE_";
        let flag = |name: &str| env_bool(&format!("{}{}", PREFIX, name), false);
        Self {
            capture_request_body_size: flag("REQUEST_BODY_SIZE"),
            capture_response_body_size: flag("RESPONSE_BODY_SIZE"),
            capture_network_local_address: flag("NETWORK_LOCAL_ADDRESS"),
            capture_network_local_port: flag("NETWORK_LOCAL_PORT"),
            capture_network_transport: flag("NETWORK_TRANSPORT"),
            capture_client_port: flag("CLIENT_PORT"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    pub known_methods: Vec<String>,
    /// Request headers recorded as `http.request.header.<name>`.
    pub request_captured_headers: Vec<String>,
    /// Response headers recorded as `http.response.header.<name>`.
    pub response_captured_headers: Vec<String>,
    pub server: HttpServerConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            known_methods: DEFAULT_KNOWN_METHODS.iter().map(|m| m.to_string()).collect(),
            request_captured_headers: Vec::new(),
            response_captured_headers: Vec::new(),
            server: HttpServerConfig::default(),
        }
    }
}

impl HttpConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let known_methods = env_list("OTEL_INSTRUMENTATION_HTTP_KNOWN_METHODS")
            .unwrap_or(defaults.known_methods);

        if let Some(bad) = known_methods.iter().find(|m| Method::from_bytes(m.as_bytes()).is_err()) {
            return Err(ConfigError::Invalid {
                key: "OTEL_INSTRUMENTATION_HTTP_KNOWN_METHODS".into(),
                message: format!("'{}' is not an HTTP method", bad),
            });
        }

        Ok(Self {
            known_methods,
            request_captured_headers: env_list(
                "OTEL_INSTRUMENTATION_HTTP_SERVER_CAPTURE_REQUEST_HEADERS",
            )
            .unwrap_or_default(),
            response_captured_headers: env_list(
                "OTEL_INSTRUMENTATION_HTTP_SERVER_CAPTURE_RESPONSE_HEADERS",
            )
            .unwrap_or_default(),
            server: HttpServerConfig::from_env(),
        })
    }

    /// The method as reported on telemetry, or `None` when it is not known.
    pub fn known_method<'a>(&self, method: &'a Method) -> Option<&'a str> {
        let name = method.as_str();
        self.known_methods
            .iter()
            .any(|m| m == name)
            .then_some(name)
    }

    /// Method name for attributes: the method itself, or `_OTHER`.
    #[inline]
    pub fn method_attribute<'a>(&self, method: &'a Method) -> &'a str {
        self.known_method(method).unwrap_or("_OTHER")
    }
}
