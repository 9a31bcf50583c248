//! Instrumentation entry point.
//!
//! Builds the default telemetry chain from configuration and telemetry
//! providers and decorates an [`HttpDriverFactory`] with it:
//!
//! ```rust,ignore
//! let instrumentation = Instrumentation::new(config, http, TelemetryProviders::global());
//! let factory = instrumentation.instrument(Arc::new(DefaultHttpDriverFactory));
//! let server = SocketHttpServer::new(factory);
//! ```

use std::fmt;
use std::sync::Arc;

use opentelemetry::{global, InstrumentationScope};
use opentelemetry::logs::Logger;
use opentelemetry::metrics::Meter;
use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::trace::{Tracer, TracerProvider as _};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use tracing::{debug, info};

use crate::config::{ConfigError, HttpConfig, InstrumentationConfig};
use crate::pipeline::TelemetryDriverFactory;
use crate::propagation::{OutboundPropagator, TraceOutboundPropagator};
use crate::route::RouteResolver;
use crate::server::HttpDriverFactory;
use crate::telemetry::semconv::{SCHEMA_URL, SCOPE_NAME};
use crate::telemetry::{
    Logs, Metrics, RequestPropagator, ResponsePropagator, TelemetryChain, TelemetryHandler,
    Tracing,
};

fn scope() -> InstrumentationScope {
    InstrumentationScope::builder(SCOPE_NAME)
        .with_version(crate::PKG_VERSION)
        .with_schema_url(SCHEMA_URL)
        .build()
}

type TracingBuilder =
    Arc<dyn Fn(Arc<dyn RouteResolver>, HttpConfig) -> Arc<dyn TelemetryHandler> + Send + Sync>;
type RequestPropagatorBuilder = Arc<dyn Fn() -> RequestPropagator + Send + Sync>;

/// Tracer, meter, optional logger and propagators the default chain uses.
#[derive(Clone)]
pub struct TelemetryProviders {
    tracing: TracingBuilder,
    meter: Meter,
    logs: Option<Arc<dyn TelemetryHandler>>,
    request_propagator: RequestPropagatorBuilder,
    response_propagator: Arc<dyn OutboundPropagator>,
}

impl TelemetryProviders {
    /// Global tracer and meter providers, W3C trace context and baggage
    /// extraction, `traceresponse` injection, no logs.
    pub fn global() -> Self {
        Self {
            tracing: Arc::new(
                |resolver: Arc<dyn RouteResolver>, config: HttpConfig| -> Arc<dyn TelemetryHandler> {
                    let tracer = global::tracer_provider().tracer_with_scope(scope());
                    Arc::new(Tracing::new(tracer, resolver, config))
                },
            ),
            meter: global::meter_with_scope(scope()),
            logs: None,
            request_propagator: Arc::new(|| {
                RequestPropagator::new(TextMapCompositePropagator::new(vec![
                    Box::new(TraceContextPropagator::new()),
                    Box::new(BaggagePropagator::new()),
                ]))
            }),
            response_propagator: Arc::new(TraceOutboundPropagator::new()),
        }
    }

    pub fn with_tracer<T>(mut self, tracer: T) -> Self
    where
        T: Tracer + Clone + Send + Sync + 'static,
        T::Span: Send + Sync + 'static,
    {
        self.tracing = Arc::new(
            move |resolver: Arc<dyn RouteResolver>, config: HttpConfig| -> Arc<dyn TelemetryHandler> {
                Arc::new(Tracing::new(tracer.clone(), resolver, config))
            },
        );
        self
    }

    pub fn with_meter(mut self, meter: Meter) -> Self {
        self.meter = meter;
        self
    }

    /// Enable the logs handler.
    pub fn with_logger<L>(mut self, logger: L) -> Self
    where
        L: Logger + Send + Sync + 'static,
    {
        self.logs = Some(Arc::new(Logs::new(logger)));
        self
    }

    pub fn with_request_propagator<P>(mut self, propagator: P) -> Self
    where
        P: TextMapPropagator + Clone + Send + Sync + 'static,
    {
        self.request_propagator = Arc::new(move || RequestPropagator::new(propagator.clone()));
        self
    }

    pub fn with_response_propagator<P: OutboundPropagator + 'static>(mut self, propagator: P) -> Self {
        self.response_propagator = Arc::new(propagator);
        self
    }
}

impl Default for TelemetryProviders {
    fn default() -> Self {
        Self::global()
    }
}

/// Decorates driver factories with the telemetry pipeline.
pub struct Instrumentation {
    config: InstrumentationConfig,
    http: HttpConfig,
    providers: TelemetryProviders,
}

impl Instrumentation {
    pub fn new(
        config: InstrumentationConfig,
        http: HttpConfig,
        providers: TelemetryProviders,
    ) -> Self {
        Self {
            config,
            http,
            providers,
        }
    }

    /// Environment configuration with the global providers.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(
            InstrumentationConfig::from_env()?,
            HttpConfig::from_env()?,
            TelemetryProviders::global(),
        ))
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Request propagator, response propagator, tracing, metrics and, when
    /// a logger is configured, logs.
    pub fn chain(&self) -> TelemetryChain {
        let resolver: Arc<dyn RouteResolver> = Arc::new(self.config.route_resolver());

        let mut chain = TelemetryChain::new()
            .with((self.providers.request_propagator)())
            .with(ResponsePropagator::from_arc(Arc::clone(
                &self.providers.response_propagator,
            )))
            .with_arc((self.providers.tracing)(
                Arc::clone(&resolver),
                self.http.clone(),
            ))
            .with(Metrics::new(
                &self.providers.meter,
                resolver,
                self.http.clone(),
            ));

        if let Some(logs) = &self.providers.logs {
            chain = chain.with_arc(Arc::clone(logs));
        }
        chain
    }

    /// Wrap `factory`, or return it unchanged when disabled.
    pub fn instrument(&self, factory: Arc<dyn HttpDriverFactory>) -> Arc<dyn HttpDriverFactory> {
        if !self.config.enabled {
            debug!("HTTP server instrumentation disabled");
            return factory;
        }

        let chain = self.chain();
        info!(handlers = ?chain.names(), "HTTP server instrumentation enabled");
        Arc::new(TelemetryDriverFactory::new(factory, chain))
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("config", &self.config)
            .field("logs", &self.providers.logs.is_some())
            .finish()
    }
}
