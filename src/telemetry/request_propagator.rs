//! Context extraction from request headers.

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::Context;

use super::TelemetryHandler;
use crate::core::Request;
use crate::propagation::HeaderExtractor;

/// Extracts the remote parent context from request headers.
pub struct RequestPropagator {
    propagator: Box<dyn TextMapPropagator + Send + Sync>,
}

impl RequestPropagator {
    pub fn new<P>(propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        Self {
            propagator: Box::new(propagator),
        }
    }

    pub fn from_boxed(propagator: Box<dyn TextMapPropagator + Send + Sync>) -> Self {
        Self { propagator }
    }
}

impl TelemetryHandler for RequestPropagator {
    fn name(&self) -> &'static str {
        "request_propagator"
    }

    fn on_request(&self, request: &mut Request, context: Context) -> Context {
        self.propagator
            .extract_with_context(&context, &HeaderExtractor::new(request.headers()))
    }
}
