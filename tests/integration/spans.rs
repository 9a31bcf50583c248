//! Server span tests: naming, attributes, propagation, deferred end.

use std::sync::Arc;

use opentelemetry::trace::{SpanId, SpanKind, Status, TraceId};
use opentelemetry::Value;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_span_named_by_route() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::new(Notify::new())).await;

    let resp = server.get("/users/42?token=abc").await;
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "user 42");

    let spans = telemetry.wait_for_spans(1).await;
    let span = &spans[0];
    assert_eq!(span.name, "GET /users/{id}");
    assert_eq!(span.span_kind, SpanKind::Server);
    assert_eq!(span_attr(span, "http.route"), Some(&Value::from("/users/{id}")));
    assert_eq!(span_attr(span, "http.request.method"), Some(&Value::from("GET")));
    assert_eq!(span_attr(span, "url.path"), Some(&Value::from("/users/42")));
    assert_eq!(span_attr(span, "url.query"), Some(&Value::from("token=abc")));
    assert_eq!(span_attr(span, "url.scheme"), Some(&Value::from("http")));
    assert_eq!(span_attr(span, "http.response.status_code"), Some(&Value::I64(200)));
    assert_eq!(span_attr(span, "server.address"), Some(&Value::from("127.0.0.1")));
    assert_eq!(
        span_attr(span, "server.port"),
        Some(&Value::I64(i64::from(server.port())))
    );
    assert_eq!(span_attr(span, "client.address"), Some(&Value::from("127.0.0.1")));
    assert_eq!(span.status, Status::Unset);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_traceresponse_matches_span() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::new(Notify::new())).await;

    let resp = server.get("/users/1").await;
    let header = resp
        .headers()
        .get("traceresponse")
        .expect("traceresponse header")
        .to_str()
        .unwrap()
        .to_string();
    resp.text().await.unwrap();

    let spans = telemetry.wait_for_spans(1).await;
    let ctx = &spans[0].span_context;
    assert_eq!(
        header,
        format!("00-{}-{}-01", ctx.trace_id(), ctx.span_id())
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_parent_from_traceparent() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::new(Notify::new())).await;

    let resp = server
        .get_with_headers(
            "/users/1",
            &[(
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            )],
        )
        .await;
    resp.text().await.unwrap();

    let spans = telemetry.wait_for_spans(1).await;
    let span = &spans[0];
    assert_eq!(
        span.span_context.trace_id(),
        TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
    );
    assert_eq!(
        span.parent_span_id,
        SpanId::from_hex("00f067aa0ba902b7").unwrap()
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rendered_server_error() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::new(Notify::new())).await;

    let resp = server.get("/fail").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.text().await.unwrap(), "503 backend down");

    let spans = telemetry.wait_for_spans(1).await;
    let span = &spans[0];
    assert_eq!(span.name, "GET /fail");
    assert_eq!(span_attr(span, "http.response.status_code"), Some(&Value::I64(503)));
    assert_eq!(span_attr(span, "error.type"), Some(&Value::from("503")));
    assert!(matches!(span.status, Status::Error { .. }));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_not_found_keeps_status_unset() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::new(Notify::new())).await;

    let resp = server.get("/nowhere").await;
    assert_status(&resp, StatusCode::NOT_FOUND);
    resp.text().await.unwrap();

    let spans = telemetry.wait_for_spans(1).await;
    let span = &spans[0];
    assert_eq!(span.name, "GET");
    assert!(span_attr(span, "http.route").is_none());
    assert_eq!(span_attr(span, "http.response.status_code"), Some(&Value::I64(404)));
    assert_eq!(span.status, Status::Unset);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_span_ends_after_streamed_body() {
    let telemetry = TestTelemetry::new();
    let gate = Arc::new(Notify::new());
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::clone(&gate)).await;

    let mut resp = server.get("/stream").await;
    assert_status(&resp, StatusCode::OK);

    let first = resp.chunk().await.unwrap().expect("first chunk");
    assert_eq!(&first[..], b"first;");
    assert!(telemetry.finished_spans().is_empty());

    gate.notify_one();
    let mut rest = Vec::new();
    while let Some(chunk) = resp.chunk().await.unwrap() {
        rest.extend_from_slice(&chunk);
    }
    assert_eq!(rest, b"second");

    let spans = telemetry.wait_for_spans(1).await;
    assert_eq!(spans[0].name, "GET /stream");

    server.stop().await;
}
