//! Error interceptor.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use opentelemetry::trace::FutureExt;
use tracing::{debug, warn};

use super::{CancelGuard, PendingError, RequestContext};
use crate::core::{HandlerError, Request, Response};
use crate::server::ErrorHandler;
use crate::telemetry::TelemetryChain;

/// Wraps the error renderer.
///
/// Requests that never went through the request interceptor bypass
/// telemetry entirely. Otherwise the stored context is active while the
/// renderer runs; a rendered response goes through the response phase,
/// a failed rendering through the error phase.
pub struct TelemetryErrorHandler {
    inner: Arc<dyn ErrorHandler>,
    chain: Arc<TelemetryChain>,
}

impl TelemetryErrorHandler {
    pub fn new(inner: Arc<dyn ErrorHandler>, chain: Arc<TelemetryChain>) -> Self {
        Self { inner, chain }
    }
}

#[async_trait]
impl ErrorHandler for TelemetryErrorHandler {
    async fn handle_error(
        &self,
        status: StatusCode,
        reason: Option<&str>,
        request: Option<&Request>,
    ) -> Result<Response, HandlerError> {
        let Some((request, context)) = request.and_then(|request| {
            request
                .extensions()
                .get::<RequestContext>()
                .map(|attached| (request, attached.0.clone()))
        }) else {
            debug!(status = status.as_u16(), "no telemetry context, rendering error directly");
            return self.inner.handle_error(status, reason, request).await;
        };

        let guard = CancelGuard::new(&self.chain, &context, request);
        let rendered = self
            .inner
            .handle_error(status, reason, Some(request))
            .with_context(context.clone())
            .await;
        guard.disarm();

        match rendered {
            Ok(mut response) => {
                self.chain.process_response(&mut response, request, &context);
                Ok(response)
            }
            Err(render_error) => {
                let original = request
                    .extensions()
                    .get::<PendingError>()
                    .map(|pending| pending.0.clone())
                    .unwrap_or_else(|| render_error.clone());

                {
                    let _guard = context.clone().attach();
                    self.chain.process_error(&original, request, &context);
                }

                if !original.same_as(&render_error) {
                    warn!(
                        error = %render_error,
                        original = %original,
                        "error renderer failed"
                    );
                }
                Err(original)
            }
        }
    }
}
