//! Driver factory decorator.

use std::sync::Arc;

use super::{TelemetryErrorHandler, TelemetryRequestHandler};
use crate::core::Client;
use crate::server::{ErrorHandler, HttpDriver, HttpDriverFactory, RequestHandler};
use crate::telemetry::TelemetryChain;

/// Hands every driver the telemetry-wrapped request and error handlers.
///
/// Everything else, including the advertised protocols, comes from the
/// wrapped factory.
pub struct TelemetryDriverFactory {
    inner: Arc<dyn HttpDriverFactory>,
    chain: Arc<TelemetryChain>,
}

impl TelemetryDriverFactory {
    pub fn new(inner: Arc<dyn HttpDriverFactory>, chain: TelemetryChain) -> Self {
        Self {
            inner,
            chain: Arc::new(chain),
        }
    }

    pub fn chain(&self) -> &TelemetryChain {
        &self.chain
    }
}

impl HttpDriverFactory for TelemetryDriverFactory {
    fn create_http_driver(
        &self,
        request_handler: Arc<dyn RequestHandler>,
        error_handler: Arc<dyn ErrorHandler>,
        client: Client,
    ) -> Arc<dyn HttpDriver> {
        let request_handler = Arc::new(TelemetryRequestHandler::new(
            request_handler,
            Arc::clone(&self.chain),
        ));
        let error_handler = Arc::new(TelemetryErrorHandler::new(
            error_handler,
            Arc::clone(&self.chain),
        ));
        self.inner
            .create_http_driver(request_handler, error_handler, client)
    }

    fn application_layer_protocols(&self) -> Vec<&'static str> {
        self.inner.application_layer_protocols()
    }
}
