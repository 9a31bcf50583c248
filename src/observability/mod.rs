//! OpenTelemetry SDK setup for the binary and for embedders that want the
//! default OTLP pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_http_otel::observability::{init_providers, OtelConfig};
//!
//! let providers = init_providers(&OtelConfig::from_env()?)?;
//! // ... run server ...
//! providers.shutdown();
//! ```

pub mod otel;

#[cfg(feature = "otlp")]
pub use otel::init_providers;
pub use otel::{install_propagator, OtelConfig, OtelProviders};
