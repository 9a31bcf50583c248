//! Core types for HTTP request/response handling.
//!
//! This module provides the fundamental types shared by request handlers,
//! the telemetry pipeline and the server:
//!
//! - [`Request`] - inbound request with named attributes and typed extensions
//! - [`Response`] - outbound response with dispose hooks
//! - [`Body`] - buffered or streamed response body
//! - [`Client`] - transport addresses of the connection
//! - [`Forwarded`] - reverse-proxy forwarded record
//! - [`HandlerError`] - failure carried through the error path
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_http_otel::core::{Request, Response};
//!
//! fn handle(req: &mut Request) -> Response {
//!     req.set_attribute("route", "/users/{id}");
//!     let mut res = Response::ok("Hello, World!");
//!     res.on_dispose(|| println!("body sent"));
//!     res
//! }
//! ```

mod body;
mod client;
mod error;
mod forwarded;
mod request;
mod response;

pub use body::{Body, BoxError, DisposeHooks, ResponseBody};
pub use client::{Client, SocketAddress};
pub use error::{HandlerError, HttpError, Result};
pub use forwarded::{Forwarded, ForwardedFor};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
