//! Per-connection HTTP drivers and the factory that creates them.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tracing::{debug, error};

use super::handler::{ErrorHandler, RequestHandler};
use crate::core::{Client, Request, Response, ResponseBody};

/// Serves the requests of one connection.
#[async_trait]
pub trait HttpDriver: Send + Sync {
    async fn handle(&self, request: http::Request<Incoming>) -> http::Response<ResponseBody>;
}

/// Creates one [`HttpDriver`] per accepted connection.
///
/// This is the seam where instrumentation substitutes wrapped handlers.
pub trait HttpDriverFactory: Send + Sync {
    fn create_http_driver(
        &self,
        request_handler: Arc<dyn RequestHandler>,
        error_handler: Arc<dyn ErrorHandler>,
        client: Client,
    ) -> Arc<dyn HttpDriver>;

    /// ALPN protocol identifiers the drivers speak.
    fn application_layer_protocols(&self) -> Vec<&'static str>;
}

/// Factory for [`DefaultHttpDriver`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHttpDriverFactory;

impl HttpDriverFactory for DefaultHttpDriverFactory {
    fn create_http_driver(
        &self,
        request_handler: Arc<dyn RequestHandler>,
        error_handler: Arc<dyn ErrorHandler>,
        client: Client,
    ) -> Arc<dyn HttpDriver> {
        Arc::new(DefaultHttpDriver {
            request_handler,
            error_handler,
            client,
        })
    }

    fn application_layer_protocols(&self) -> Vec<&'static str> {
        vec!["h2", "http/1.1"]
    }
}

/// Buffers the request body, calls the request handler and falls back to
/// the error handler on failure.
pub struct DefaultHttpDriver {
    request_handler: Arc<dyn RequestHandler>,
    error_handler: Arc<dyn ErrorHandler>,
    client: Client,
}

impl DefaultHttpDriver {
    async fn render_error(
        &self,
        status: StatusCode,
        reason: Option<&str>,
        request: Option<&Request>,
    ) -> Response {
        match self.error_handler.handle_error(status, reason, request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    error = %e,
                    error_type = e.type_name(),
                    status = status.as_u16(),
                    "error handler failed, sending bare 500"
                );
                Response::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[async_trait]
impl HttpDriver for DefaultHttpDriver {
    async fn handle(&self, request: http::Request<Incoming>) -> http::Response<ResponseBody> {
        let (parts, body) = request.into_parts();

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(error = %e, "failed to read request body");
                return self
                    .render_error(StatusCode::BAD_REQUEST, None, None)
                    .await
                    .into_http();
            }
        };

        let mut request = Request::new(parts.method, parts.uri, parts.headers, body)
            .with_client(self.client.clone());
        request.set_version(parts.version);

        let response = match self.request_handler.handle_request(&mut request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, error_type = e.type_name(), "request handler failed");
                self.render_error(e.status(), e.reason(), Some(&request))
                    .await
            }
        };

        response.into_http()
    }
}
