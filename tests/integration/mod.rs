//! Integration tests for tokio_http_otel
//!
//! Each test starts the reference server in-process on an ephemeral port,
//! instrumented with SDK providers that export to in-memory exporters, and
//! calls it with `reqwest`.
//!
//! Run with: cargo test --test integration

mod helpers;

mod instrumentation;
mod logs;
mod metrics;
mod spans;
