//! Telemetry pipeline wrapped around the server's entry points.
//!
//! [`TelemetryRequestHandler`] and [`TelemetryErrorHandler`] run a
//! [`TelemetryChain`](crate::telemetry::TelemetryChain) around the real
//! request and error handlers. [`TelemetryDriverFactory`] substitutes both
//! wrappers into every driver a factory creates.
//!
//! ```text
//! request ─► on_request (a, b, ..) ─► handler (context active) ─► on_response (a, b, ..)
//!                                        │
//!                                        └─ error ─► renderer (context active)
//!                                                      ├─ ok  ─► on_response (a, b, ..)
//!                                                      └─ err ─► on_error (a, b, ..)
//! ```
//!
//! A handler or renderer future dropped before it completes (client gone)
//! runs `on_error` from its drop.

mod driver;
mod error;
mod request;

pub use driver::TelemetryDriverFactory;
pub use error::TelemetryErrorHandler;
pub use request::TelemetryRequestHandler;

use std::sync::Arc;

use opentelemetry::Context;
use tracing::debug;

use crate::core::{HandlerError, Request};
use crate::telemetry::TelemetryChain;

/// Context derived by the request phase, attached to the request.
#[derive(Clone, Debug)]
pub struct RequestContext(pub Context);

impl RequestContext {
    /// Context attached to `request`, if the request interceptor ran.
    pub fn of(request: &Request) -> Option<&Context> {
        request.extensions().get::<RequestContext>().map(|c| &c.0)
    }
}

/// Error the request handler failed with, kept for the error interceptor.
#[derive(Clone, Debug)]
pub(crate) struct PendingError(pub(crate) HandlerError);

/// Runs the error phase if dropped while armed, i.e. when the server drops
/// a handler or renderer future before it completes.
///
/// Keeps a copy of the request: the original stays borrowed by the future
/// being guarded. The reported error is the recorded handler error when
/// there is one, a "request cancelled" error otherwise.
pub(crate) struct CancelGuard {
    chain: Arc<TelemetryChain>,
    context: Context,
    request: Option<Request>,
}

impl CancelGuard {
    pub(crate) fn new(chain: &Arc<TelemetryChain>, context: &Context, request: &Request) -> Self {
        Self {
            chain: Arc::clone(chain),
            context: context.clone(),
            request: Some(request.snapshot()),
        }
    }

    pub(crate) fn disarm(mut self) {
        self.request = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        let Some(request) = self.request.take() else {
            return;
        };
        debug!(path = request.path(), "request cancelled before a response was produced");

        let error = match request.extensions().get::<PendingError>() {
            Some(pending) => pending.0.clone(),
            None => HandlerError::msg("request cancelled"),
        };
        let _guard = self.context.clone().attach();
        self.chain.process_error(&error, &request, &self.context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HttpError, Response};
    use crate::server::{ErrorHandler, RequestHandler};
    use crate::telemetry::{TelemetryChain, TelemetryHandler};
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use opentelemetry::KeyValue;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn marker(cx: &Context) -> String {
        cx.get::<KeyValue>()
            .map(|kv| kv.value.as_str().into_owned())
            .unwrap_or_else(|| "-".to_string())
    }

    struct Recording {
        name: &'static str,
        journal: Journal,
    }

    impl TelemetryHandler for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_request(&self, _request: &mut Request, context: Context) -> Context {
            self.journal.push(format!("request:{}", self.name));
            context.with_value(KeyValue::new("marker", self.name))
        }

        fn on_response(&self, response: &mut Response, _request: &Request, context: &Context) {
            self.journal.push(format!(
                "response:{}:{}:{}",
                self.name,
                response.status().as_u16(),
                marker(context)
            ));
        }

        fn on_error(&self, error: &HandlerError, _request: &Request, context: &Context) {
            self.journal.push(format!(
                "error:{}:{}:{}:{}",
                self.name,
                error,
                marker(context),
                marker(&Context::current())
            ));
        }
    }

    fn chain(journal: &Journal) -> Arc<TelemetryChain> {
        Arc::new(
            TelemetryChain::new()
                .with(Recording {
                    name: "a",
                    journal: journal.clone(),
                })
                .with(Recording {
                    name: "b",
                    journal: journal.clone(),
                }),
        )
    }

    struct App {
        journal: Journal,
        fail: bool,
    }

    #[async_trait]
    impl RequestHandler for App {
        async fn handle_request(&self, _request: &mut Request) -> Result<Response, HandlerError> {
            tokio::task::yield_now().await;
            self.journal
                .push(format!("handler:{}", marker(&Context::current())));
            if self.fail {
                Err(HttpError::with_reason(StatusCode::BAD_GATEWAY, "upstream").into())
            } else {
                Ok(Response::ok("ok"))
            }
        }
    }

    struct Renderer {
        journal: Journal,
        fail: bool,
    }

    #[async_trait]
    impl ErrorHandler for Renderer {
        async fn handle_error(
            &self,
            status: StatusCode,
            _reason: Option<&str>,
            _request: Option<&Request>,
        ) -> Result<Response, HandlerError> {
            self.journal
                .push(format!("render:{}:{}", status.as_u16(), marker(&Context::current())));
            if self.fail {
                Err(HandlerError::msg("renderer broke"))
            } else {
                Ok(Response::error_page(status, None))
            }
        }
    }

    fn request() -> Request {
        Request::new(Method::GET, "/".parse().unwrap(), HeaderMap::new(), Bytes::new())
    }

    fn handlers(
        journal: &Journal,
        app_fails: bool,
        renderer_fails: bool,
    ) -> (TelemetryRequestHandler, TelemetryErrorHandler) {
        let chain = chain(journal);
        (
            TelemetryRequestHandler::new(
                Arc::new(App {
                    journal: journal.clone(),
                    fail: app_fails,
                }),
                Arc::clone(&chain),
            ),
            TelemetryErrorHandler::new(
                Arc::new(Renderer {
                    journal: journal.clone(),
                    fail: renderer_fails,
                }),
                chain,
            ),
        )
    }

    #[test]
    fn test_success_path_order() {
        let journal = Journal::default();
        let (request_handler, _) = handlers(&journal, false, false);
        let mut req = request();

        let response = tokio_test::block_on(request_handler.handle_request(&mut req)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            journal.entries(),
            vec![
                "request:a",
                "request:b",
                "handler:b",
                "response:a:200:b",
                "response:b:200:b"
            ]
        );
        assert!(RequestContext::of(&req).is_some());
        // scope closed after the handler
        assert_eq!(marker(&Context::current()), "-");
    }

    #[test]
    fn test_renderer_success_runs_response_phase() {
        let journal = Journal::default();
        let (request_handler, error_handler) = handlers(&journal, true, false);
        let mut req = request();

        let err = tokio_test::block_on(request_handler.handle_request(&mut req)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let response = tokio_test::block_on(error_handler.handle_error(
            err.status(),
            err.reason(),
            Some(&req),
        ))
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            journal.entries(),
            vec![
                "request:a",
                "request:b",
                "handler:b",
                "render:502:b",
                "response:a:502:b",
                "response:b:502:b"
            ]
        );
    }

    #[test]
    fn test_renderer_failure_runs_error_phase_and_keeps_original() {
        let journal = Journal::default();
        let (request_handler, error_handler) = handlers(&journal, true, true);
        let mut req = request();

        let err = tokio_test::block_on(request_handler.handle_request(&mut req)).unwrap_err();
        let propagated = tokio_test::block_on(error_handler.handle_error(
            err.status(),
            err.reason(),
            Some(&req),
        ))
        .unwrap_err();

        assert!(propagated.same_as(&err));
        assert_eq!(
            journal.entries(),
            vec![
                "request:a",
                "request:b",
                "handler:b",
                "render:502:b",
                "error:a:HTTP 502: upstream:b:b",
                "error:b:HTTP 502: upstream:b:b"
            ]
        );
        assert_eq!(marker(&Context::current()), "-");
    }

    #[test]
    fn test_renderer_error_propagates_without_pending_error() {
        let journal = Journal::default();
        let (request_handler, error_handler) = handlers(&journal, false, true);
        let mut req = request();

        tokio_test::block_on(request_handler.handle_request(&mut req)).unwrap();
        let err = tokio_test::block_on(error_handler.handle_error(
            StatusCode::NOT_FOUND,
            None,
            Some(&req),
        ))
        .unwrap_err();

        assert_eq!(err.to_string(), "renderer broke");
        assert!(journal
            .entries()
            .contains(&"error:a:renderer broke:b:b".to_string()));
    }

    #[test]
    fn test_no_context_bypasses_telemetry() {
        let journal = Journal::default();
        let (_, error_handler) = handlers(&journal, false, true);

        let err = tokio_test::block_on(error_handler.handle_error(
            StatusCode::BAD_REQUEST,
            None,
            Some(&request()),
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "renderer broke");

        let (_, error_handler) = handlers(&journal, false, false);
        let response =
            tokio_test::block_on(error_handler.handle_error(StatusCode::BAD_REQUEST, None, None))
                .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(journal.entries(), vec!["render:400:-", "render:400:-"]);
    }

    struct StalledRenderer;

    #[async_trait]
    impl ErrorHandler for StalledRenderer {
        async fn handle_error(
            &self,
            _status: StatusCode,
            _reason: Option<&str>,
            _request: Option<&Request>,
        ) -> Result<Response, HandlerError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_dropped_renderer_reports_handler_error() {
        let journal = Journal::default();
        let chain = chain(&journal);
        let request_handler = TelemetryRequestHandler::new(
            Arc::new(App {
                journal: journal.clone(),
                fail: true,
            }),
            Arc::clone(&chain),
        );
        let error_handler = TelemetryErrorHandler::new(Arc::new(StalledRenderer), chain);
        let mut req = request();

        let err = tokio_test::block_on(request_handler.handle_request(&mut req)).unwrap_err();
        {
            let mut task = tokio_test::task::spawn(error_handler.handle_error(
                err.status(),
                err.reason(),
                Some(&req),
            ));
            assert!(task.poll().is_pending());
        }

        assert_eq!(
            journal.entries(),
            vec![
                "request:a",
                "request:b",
                "handler:b",
                "error:a:HTTP 502: upstream:b:b",
                "error:b:HTTP 502: upstream:b:b"
            ]
        );
        assert_eq!(marker(&Context::current()), "-");
    }
}
