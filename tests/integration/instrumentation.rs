//! Enabling, disabling and configuring the instrumentation.

use std::sync::Arc;

use opentelemetry::Value;
use tokio::sync::Notify;

use tokio_http_otel::config::{HttpConfig, InstrumentationConfig};
use tokio_http_otel::core::{Request, Response};
use tokio_http_otel::instrumentation::Instrumentation;
use tokio_http_otel::server::{ClosureRequestHandler, DefaultErrorHandler};

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disabled_serves_without_telemetry() {
    let telemetry = TestTelemetry::new();
    let config = InstrumentationConfig {
        enabled: false,
        ..Default::default()
    };
    let instrumentation = Instrumentation::new(config, HttpConfig::default(), telemetry.providers());
    let server = TestServer::with_router(&instrumentation, Arc::new(Notify::new())).await;

    let resp = server.get("/users/5").await;
    assert!(resp.headers().get("traceresponse").is_none());
    assert_eq!(resp.text().await.unwrap(), "user 5");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(telemetry.finished_spans().is_empty());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_json_route_resolvers_in_declared_order() {
    let telemetry = TestTelemetry::new();
    let config = InstrumentationConfig::from_json(
        r#"{
            "route_resolvers": [
                {"request_attribute": {"attribute": "router.primary"}},
                {"request_attribute": {"attribute": "router.fallback"}}
            ]
        }"#,
    )
    .unwrap();
    let instrumentation = Instrumentation::new(config, HttpConfig::default(), telemetry.providers());

    let app = Arc::new(ClosureRequestHandler::new(|req: &mut Request| {
        req.set_attribute("router.fallback", "/fallback/{x}");
        if req.path() == "/both" {
            req.set_attribute("router.primary", "/primary/{x}");
        }
        Ok(Response::ok("ok"))
    }));
    let server = TestServer::start(&instrumentation, app, Arc::new(DefaultErrorHandler)).await;

    server.get("/both").await.text().await.unwrap();
    let spans = telemetry.wait_for_spans(1).await;
    assert_eq!(span_attr(&spans[0], "http.route"), Some(&Value::from("/primary/{x}")));

    server.get("/one").await.text().await.unwrap();
    let spans = telemetry.wait_for_spans(2).await;
    assert_eq!(span_attr(&spans[1], "http.route"), Some(&Value::from("/fallback/{x}")));

    server.stop().await;
}

#[test]
fn test_env_disable_list() {
    let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    assert!(InstrumentationConfig::enabled_with(&list(&[])));
    assert!(InstrumentationConfig::enabled_with(&list(&["grpc"])));
    assert!(!InstrumentationConfig::enabled_with(&list(&["all"])));
    assert!(!InstrumentationConfig::enabled_with(&list(&["grpc", "tokio-http-server"])));
}
