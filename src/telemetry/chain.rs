//! Ordered telemetry handler chain.

use std::sync::Arc;

use opentelemetry::Context;

use super::TelemetryHandler;
use crate::core::{HandlerError, Request, Response};

/// Immutable, ordered list of telemetry handlers.
///
/// All three phases walk the handlers in registration order.
#[derive(Clone, Default)]
pub struct TelemetryChain {
    handlers: Vec<Arc<dyn TelemetryHandler>>,
}

impl TelemetryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn with<H: TelemetryHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append a handler wrapped in Arc.
    pub fn with_arc(mut self, handler: Arc<dyn TelemetryHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Thread the context through every `on_request`.
    pub fn process_request(&self, request: &mut Request, mut context: Context) -> Context {
        for handler in &self.handlers {
            context = handler.on_request(request, context);
        }
        context
    }

    pub fn process_response(&self, response: &mut Response, request: &Request, context: &Context) {
        for handler in &self.handlers {
            handler.on_response(response, request, context);
        }
    }

    pub fn process_error(&self, error: &HandlerError, request: &Request, context: &Context) {
        for handler in &self.handlers {
            handler.on_error(error, request, context);
        }
        tracing::debug!(
            handlers = self.handlers.len(),
            error_type = error.type_name(),
            "telemetry recorded request error"
        );
    }
}

impl std::fmt::Debug for TelemetryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
