//! HTTP server metrics recorded through the running server.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::Value;
use opentelemetry_sdk::metrics::data::{Aggregation as _, Histogram, ResourceMetrics, Sum};
use reqwest::StatusCode;
use tokio::sync::Notify;
use tokio_http_otel::server::DefaultErrorHandler;

use crate::helpers::*;

/// `(route, status, count)` of every duration data point in the last export.
fn duration_points(metrics: &[ResourceMetrics]) -> Vec<(Option<Value>, Option<Value>, u64)> {
    let mut points = Vec::new();
    let Some(last) = metrics.last() else {
        return points;
    };
    for sm in &last.scope_metrics {
        for metric in &sm.metrics {
            if metric.name != "http.server.request.duration" {
                continue;
            }
            assert_eq!(metric.unit, "s");
            if let Some(h) = metric.data.as_any().downcast_ref::<Histogram<f64>>() {
                for dp in &h.data_points {
                    points.push((
                        attr(&dp.attributes, "http.route").cloned(),
                        attr(&dp.attributes, "http.response.status_code").cloned(),
                        dp.count,
                    ));
                }
            }
        }
    }
    points
}

fn active_requests(metrics: &[ResourceMetrics]) -> Option<i64> {
    let last = metrics.last()?;
    let mut total = None;
    for sm in &last.scope_metrics {
        for metric in &sm.metrics {
            if metric.name != "http.server.active_requests" {
                continue;
            }
            if let Some(sum) = metric.data.as_any().downcast_ref::<Sum<i64>>() {
                total = Some(sum.data_points.iter().map(|dp| dp.value).sum());
            }
        }
    }
    total
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duration_per_route_and_status() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::new(Notify::new())).await;

    for id in 1..=3 {
        let resp = server.get(&format!("/users/{}", id)).await;
        assert_status(&resp, StatusCode::OK);
        resp.text().await.unwrap();
    }
    let resp = server.get("/fail").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    resp.text().await.unwrap();

    telemetry.wait_for_spans(4).await;
    let points = duration_points(&telemetry.collect_metrics());

    assert!(points.contains(&(
        Some(Value::from("/users/{id}")),
        Some(Value::I64(200)),
        3
    )));
    assert!(points.contains(&(Some(Value::from("/fail")), Some(Value::I64(503)), 1)));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_active_requests_return_to_zero() {
    let telemetry = TestTelemetry::new();
    let gate = Arc::new(Notify::new());
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::clone(&gate)).await;

    let mut resp = server.get("/stream").await;
    resp.chunk().await.unwrap().expect("first chunk");
    assert_eq!(active_requests(&telemetry.collect_metrics()), Some(1));

    gate.notify_one();
    while resp.chunk().await.unwrap().is_some() {}
    telemetry.wait_for_spans(1).await;

    let resp = server.get("/nowhere").await;
    resp.text().await.unwrap();
    telemetry.wait_for_spans(2).await;

    assert_eq!(active_requests(&telemetry.collect_metrics()), Some(0));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_stream_releases_active_request() {
    let telemetry = TestTelemetry::new();
    let gate = Arc::new(Notify::new());
    let server = TestServer::with_router(&telemetry.instrumentation(), Arc::clone(&gate)).await;

    let mut resp = server.get("/stream").await;
    resp.chunk().await.unwrap().expect("first chunk");
    drop(resp);
    // Either the server sees the closed socket or it writes the last chunk
    // into it; both finish the body.
    gate.notify_one();

    let spans = telemetry.wait_for_spans(1).await;
    assert_eq!(spans[0].name, "GET /stream");
    assert_eq!(active_requests(&telemetry.collect_metrics()), Some(0));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_during_handler_releases_active_request() {
    let telemetry = TestTelemetry::new();
    let server = TestServer::start(
        &telemetry.instrumentation(),
        Arc::new(StalledHandler),
        Arc::new(DefaultErrorHandler),
    )
    .await;

    let outcome = server
        .client
        .get(format!("{}/stall", server.base_url))
        .timeout(Duration::from_millis(200))
        .send()
        .await;
    assert!(outcome.is_err(), "handler should still be pending");

    let spans = telemetry.wait_for_spans(1).await;
    assert_eq!(spans[0].status, opentelemetry::trace::Status::error("request cancelled"));
    assert_eq!(active_requests(&telemetry.collect_metrics()), Some(0));

    server.stop().await;
}
