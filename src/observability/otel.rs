//! OpenTelemetry provider setup with OTLP export.
//!
//! # Configuration
//!
//! Set environment variables to configure:
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (default: `http://localhost:4317`)
//! - `OTEL_SERVICE_NAME`: Service name (default: `tokio_http_otel`)
//! - `OTEL_SERVICE_VERSION`: Service version (default: from Cargo.toml)
//! - `OTEL_ENVIRONMENT`: Deployment environment (default: `development`)
//! - `OTEL_SAMPLING_RATIO`: Sampling ratio 0.0-1.0 (default: `1.0`)
//! - `OTEL_EXPORT_TIMEOUT`: Export timeout in seconds (default: `10`)
//! - `OTEL_METRIC_EXPORT_INTERVAL`: Metric export interval (default: `60s`)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (`1` = enabled)
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_http_otel::observability::{init_providers, OtelConfig};
//!
//! let providers = init_providers(&OtelConfig::from_env()?)?;
//!
//! // ... run server ...
//!
//! providers.shutdown();
//! ```

use std::time::Duration;

use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing::{info, warn};

use crate::config::{env_bool, env_duration, env_or, env_parse, ConfigError};

// Semantic convention keys (avoiding dependency on semconv_experimental feature)
const SERVICE_NAME: &str = "service.name";
const SERVICE_VERSION: &str = "service.version";
const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

/// OpenTelemetry configuration.
#[derive(Debug, Clone)]
pub struct OtelConfig {
    /// OTLP endpoint (e.g., "http://collector:4317")
    pub endpoint: String,
    pub service_name: String,
    pub service_version: String,
    /// Deployment environment (production, staging, etc.)
    pub environment: String,
    /// Sampling ratio (0.0 - 1.0, 1.0 = sample all)
    pub sampling_ratio: f64,
    pub export_timeout_secs: u64,
    pub metric_interval: Duration,
    pub enabled: bool,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4317".into(),
            service_name: "tokio_http_otel".into(),
            service_version: env!("CARGO_PKG_VERSION").into(),
            environment: "development".into(),
            sampling_ratio: 1.0,
            export_timeout_secs: 10,
            metric_interval: Duration::from_secs(60),
            enabled: false,
        }
    }
}

impl OtelConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let sampling_ratio = env_parse("OTEL_SAMPLING_RATIO", defaults.sampling_ratio)?;
        if !(0.0..=1.0).contains(&sampling_ratio) {
            return Err(ConfigError::Invalid {
                key: "OTEL_SAMPLING_RATIO".into(),
                message: format!("{} is outside 0.0-1.0", sampling_ratio),
            });
        }

        let metric_interval = env_duration("OTEL_METRIC_EXPORT_INTERVAL", "60s")?
            .unwrap_or(defaults.metric_interval);

        Ok(Self {
            endpoint: env_or("OTEL_EXPORTER_OTLP_ENDPOINT", &defaults.endpoint),
            service_name: env_or("OTEL_SERVICE_NAME", &defaults.service_name),
            service_version: env_or("OTEL_SERVICE_VERSION", &defaults.service_version),
            environment: env_or("OTEL_ENVIRONMENT", &defaults.environment),
            sampling_ratio,
            export_timeout_secs: env_parse("OTEL_EXPORT_TIMEOUT", defaults.export_timeout_secs)?,
            metric_interval,
            enabled: env_bool("OTEL_ENABLED", false),
        })
    }

    /// Check if OpenTelemetry is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn resource(&self) -> Resource {
        Resource::new([
            KeyValue::new(SERVICE_NAME, self.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, self.service_version.clone()),
            KeyValue::new(DEPLOYMENT_ENVIRONMENT, self.environment.clone()),
        ])
    }
}

/// SDK providers created by [`init_providers`].
///
/// Tracer and meter providers are also installed globally; the logger
/// provider has no global slot and must be passed to the instrumentation.
#[derive(Default)]
pub struct OtelProviders {
    pub tracer_provider: Option<TracerProvider>,
    pub meter_provider: Option<SdkMeterProvider>,
    pub logger_provider: Option<LoggerProvider>,
}

impl OtelProviders {
    /// Flush pending telemetry and stop exporters.
    pub fn shutdown(self) {
        if let Some(provider) = self.meter_provider {
            if let Err(e) = provider.shutdown() {
                warn!(error = %e, "Meter provider shutdown failed");
            }
        }
        if let Some(provider) = self.logger_provider {
            if let Err(e) = provider.shutdown() {
                warn!(error = %e, "Logger provider shutdown failed");
            }
        }
        if self.tracer_provider.is_some() {
            global::shutdown_tracer_provider();
        }
        info!("OpenTelemetry shutdown complete");
    }
}

/// Install the W3C trace-context and baggage propagators globally.
pub fn install_propagator() {
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));
}

/// Initialize OTLP traces, metrics and logs.
///
/// Registers the tracer and meter providers and the text-map propagator
/// globally. Call [`OtelProviders::shutdown`] before process exit.
///
/// # Errors
///
/// Returns an error if an exporter cannot be built.
#[cfg(feature = "otlp")]
pub fn init_providers(
    config: &OtelConfig,
) -> Result<OtelProviders, Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::metrics::PeriodicReader;
    use opentelemetry_sdk::runtime;
    use opentelemetry_sdk::trace::{Config, Sampler};

    install_propagator();

    if !config.enabled {
        info!("OpenTelemetry disabled (OTEL_ENABLED != 1)");
        return Ok(OtelProviders::default());
    }

    let timeout = Duration::from_secs(config.export_timeout_secs);

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .with_timeout(timeout)
        .build()?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(span_exporter, runtime::Tokio)
        .with_config(
            Config::default()
                .with_resource(config.resource())
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    config.sampling_ratio,
                )))),
        )
        .build();

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .with_timeout(timeout)
        .build()?;

    let reader = PeriodicReader::builder(metric_exporter, runtime::Tokio)
        .with_interval(config.metric_interval)
        .build();

    let meter_provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    let log_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .with_timeout(timeout)
        .build()?;

    let logger_provider = LoggerProvider::builder()
        .with_batch_exporter(log_exporter, runtime::Tokio)
        .with_resource(config.resource())
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    global::set_meter_provider(meter_provider.clone());

    info!(
        endpoint = %config.endpoint,
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        sampling = %config.sampling_ratio,
        "OpenTelemetry initialized"
    );

    Ok(OtelProviders {
        tracer_provider: Some(tracer_provider),
        meter_provider: Some(meter_provider),
        logger_provider: Some(logger_provider),
    })
}
