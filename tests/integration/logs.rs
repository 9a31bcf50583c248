//! Error log records.

use std::sync::Arc;

use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_records_when_renderer_succeeds() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::new(Notify::new())).await;

    server.get("/users/1").await.text().await.unwrap();
    server.get("/boom").await.text().await.unwrap();
    telemetry.wait_for_spans(2).await;

    assert_eq!(telemetry.emitted_logs(), 0);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_record_when_renderer_fails() {
    let telemetry = TestTelemetry::new();
    let gate = Arc::new(Notify::new());
    let server = TestServer::start(
        &telemetry.instrumentation(),
        router(gate),
        Arc::new(FailingErrorHandler),
    )
    .await;

    let resp = server.get("/boom").await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    resp.text().await.unwrap();

    // on_error ends the span before the logs handler runs
    let spans = telemetry.wait_for_spans(1).await;
    assert_eq!(spans[0].name, "GET /boom");
    assert_eq!(telemetry.emitted_logs(), 1);

    server.stop().await;
}
