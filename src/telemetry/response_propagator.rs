//! Correlation headers on outgoing responses.

use std::sync::Arc;

use opentelemetry::Context;

use super::TelemetryHandler;
use crate::core::{Request, Response};
use crate::propagation::{HeaderInjector, OutboundPropagator};

/// Injects outbound headers into every response.
pub struct ResponsePropagator {
    propagator: Arc<dyn OutboundPropagator>,
}

impl ResponsePropagator {
    pub fn new<P: OutboundPropagator + 'static>(propagator: P) -> Self {
        Self {
            propagator: Arc::new(propagator),
        }
    }

    pub fn from_arc(propagator: Arc<dyn OutboundPropagator>) -> Self {
        Self { propagator }
    }
}

impl TelemetryHandler for ResponsePropagator {
    fn name(&self) -> &'static str {
        "response_propagator"
    }

    fn on_response(&self, response: &mut Response, _request: &Request, context: &Context) {
        self.propagator
            .inject(context, &mut HeaderInjector(response.headers_mut()));
    }
}
