//! tokio_http_otel - OpenTelemetry instrumentation for async HTTP servers.
//!
//! Wraps a server's request and error handlers in a telemetry pipeline that
//! produces server spans, HTTP server metrics and error log records without
//! touching application request handling.
//!
//! # Features
//!
//! - **Handler chain**: request/response propagators, tracing, metrics and
//!   logs run in a fixed order for every lifecycle phase
//! - **Deferred completion**: spans end and durations are recorded when the
//!   response body is done, not when the handler returns
//! - **Route resolution**: low-cardinality `http.route` from request
//!   attributes set by a router
//! - **Address resolution**: `server.*` and `client.*` from forwarded
//!   records, `Host`/`:authority` and socket addresses
//!
//! # Architecture
//!
//! ```text
//! SocketHttpServer ─► HttpDriverFactory ─► HttpDriver ─► RequestHandler / ErrorHandler
//!                         ▲
//!                         └── TelemetryDriverFactory wraps both handlers with the
//!                             TelemetryChain built by Instrumentation
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_http_otel::instrumentation::Instrumentation;
//! use tokio_http_otel::server::{DefaultHttpDriverFactory, SocketHttpServer};
//!
//! let instrumentation = Instrumentation::from_env()?;
//! let factory = instrumentation.instrument(Arc::new(DefaultHttpDriverFactory));
//! let running = SocketHttpServer::new(factory)
//!     .start(addr, request_handler, error_handler)
//!     .await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod address;
pub mod config;
pub mod core;
pub mod instrumentation;
pub mod logging;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod propagation;
pub mod route;
pub mod server;
pub mod telemetry;

// Re-exports for convenience
pub use config::Config;
pub use instrumentation::{Instrumentation, TelemetryProviders};
pub use server::SocketHttpServer;
