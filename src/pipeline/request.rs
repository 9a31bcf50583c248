//! Request interceptor.

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::trace::FutureExt;
use opentelemetry::Context;

use super::{CancelGuard, PendingError, RequestContext};
use crate::core::{HandlerError, Request, Response};
use crate::server::RequestHandler;
use crate::telemetry::TelemetryChain;

/// Runs the chain's request phase, calls the wrapped handler with the
/// resulting context active and runs the response phase on success.
///
/// On failure the context stays attached to the request and the error is
/// recorded next to it, so the error interceptor can finish the request.
/// If the handler future is dropped before it completes (the client went
/// away), the error phase runs when the future is dropped instead.
pub struct TelemetryRequestHandler {
    inner: Arc<dyn RequestHandler>,
    chain: Arc<TelemetryChain>,
}

impl TelemetryRequestHandler {
    pub fn new(inner: Arc<dyn RequestHandler>, chain: Arc<TelemetryChain>) -> Self {
        Self { inner, chain }
    }
}

#[async_trait]
impl RequestHandler for TelemetryRequestHandler {
    async fn handle_request(&self, request: &mut Request) -> Result<Response, HandlerError> {
        let context = self.chain.process_request(request, Context::current());
        request
            .extensions_mut()
            .insert(RequestContext(context.clone()));

        let guard = CancelGuard::new(&self.chain, &context, request);

        let result = self
            .inner
            .handle_request(request)
            .with_context(context.clone())
            .await;
        guard.disarm();

        match result {
            Ok(mut response) => {
                self.chain.process_response(&mut response, request, &context);
                Ok(response)
            }
            Err(e) => {
                request.extensions_mut().insert(PendingError(e.clone()));
                Err(e)
            }
        }
    }
}
