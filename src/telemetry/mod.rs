//! Telemetry handlers observing the request lifecycle.
//!
//! A [`TelemetryHandler`] sees three phases of every request:
//! - `on_request`: derive a new context from the incoming one
//! - `on_response`: inspect the response, defer completion work to
//!   [`Response::on_dispose`]
//! - `on_error`: finalize whatever `on_request` opened
//!
//! Handlers are shared across requests and keep no per-request state of
//! their own. Anything that must survive between phases travels on the
//! request extensions or in the context.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_http_otel::telemetry::{Metrics, RequestPropagator, TelemetryChain, Tracing};
//!
//! let chain = TelemetryChain::new()
//!     .with(RequestPropagator::new(TraceContextPropagator::new()))
//!     .with(Tracing::new(tracer, resolver.clone(), http.clone()))
//!     .with(Metrics::new(&meter, resolver, http));
//! ```

mod chain;
mod logs;
mod metrics;
mod request_propagator;
mod response_propagator;
mod sanitizer;
pub(crate) mod semconv;
mod trace;

pub use chain::TelemetryChain;
pub use logs::Logs;
pub use metrics::{Metrics, DURATION_BUCKETS};
pub use request_propagator::RequestPropagator;
pub use response_propagator::ResponsePropagator;
pub use sanitizer::{DefaultSanitizer, UriSanitizer};
pub use semconv::SCOPE_NAME;
pub use trace::Tracing;

use opentelemetry::Context;

use crate::core::{HandlerError, Request, Response};

/// Observer of one request's lifecycle.
pub trait TelemetryHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &'static str;

    /// Called before the request handler runs. Returns the context the
    /// next handler (and finally the request handler) sees.
    fn on_request(&self, _request: &mut Request, context: Context) -> Context {
        context
    }

    /// Called with the response produced for the request.
    fn on_response(&self, _response: &mut Response, _request: &Request, _context: &Context) {}

    /// Called when no response could be produced.
    fn on_error(&self, _error: &HandlerError, _request: &Request, _context: &Context) {}
}
