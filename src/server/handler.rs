//! Application entry points called by the HTTP driver.

use async_trait::async_trait;
use http::StatusCode;

use crate::core::{HandlerError, Request, Response};

/// Produces a response for a request.
///
/// The request is borrowed mutably so wrappers can attach per-request state
/// that the error path reads back.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, request: &mut Request) -> Result<Response, HandlerError>;
}

/// Renders error responses.
///
/// `request` is `None` when the failure happened before a request could be
/// built, e.g. when reading the body failed.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle_error(
        &self,
        status: StatusCode,
        reason: Option<&str>,
        request: Option<&Request>,
    ) -> Result<Response, HandlerError>;
}

/// Adapts a synchronous closure into a [`RequestHandler`].
pub struct ClosureRequestHandler<F> {
    handler: F,
}

impl<F> ClosureRequestHandler<F>
where
    F: Fn(&mut Request) -> Result<Response, HandlerError> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> RequestHandler for ClosureRequestHandler<F>
where
    F: Fn(&mut Request) -> Result<Response, HandlerError> + Send + Sync,
{
    async fn handle_request(&self, request: &mut Request) -> Result<Response, HandlerError> {
        (self.handler)(request)
    }
}

/// Plain-text `"{code} {reason}"` error pages.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorHandler;

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn handle_error(
        &self,
        status: StatusCode,
        reason: Option<&str>,
        _request: Option<&Request>,
    ) -> Result<Response, HandlerError> {
        Ok(Response::error_page(status, reason))
    }
}
