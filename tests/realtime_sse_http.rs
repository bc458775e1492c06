mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use drowsiness_monitor::config::LimitsConfig;
use http_body_util::BodyExt;

use common::app::{spawn_test_app, spawn_with_limits};
use common::http::{frame, request, response_json};

async fn next_chunk(body: &mut Body) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("sse frame in time")
        .expect("stream open")
        .expect("frame ok");
    let data = frame.into_data().expect("data frame");
    String::from_utf8_lossy(&data).to_string()
}

#[tokio::test]
async fn it_sse_endpoint_is_reachable() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None, &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/event-stream"));
}

#[tokio::test]
async fn it_sse_sends_status_then_session_events() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None, &[]).await;
    let mut body = response.into_body();

    let status = next_chunk(&mut body).await;
    assert!(status.contains("event: status"));
    assert!(status.contains("\"active\":false"));

    request(&app.app, Method::POST, "/api/session/start", None, &[]).await;
    let started = next_chunk(&mut body).await;
    assert!(started.contains("event: session_started"));

    request(
        &app.app,
        Method::POST,
        "/api/session/frames",
        Some(frame(0.3, 0)),
        &[],
    )
    .await;
    let report = next_chunk(&mut body).await;
    assert!(report.contains("event: frame"));
    assert!(report.contains("\"status\":\"Awake\""));
}

#[tokio::test]
async fn it_sse_connection_limit() {
    let app = spawn_with_limits(LimitsConfig {
        max_sse_connections: 0,
        event_buffer: 16,
    })
    .await;

    let resp = request(&app.app, Method::GET, "/api/realtime/events", None, &[]).await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn it_sse_closes_on_shutdown() {
    let app = spawn_test_app().await;
    let response = request(&app.app, Method::GET, "/api/realtime/events", None, &[]).await;
    let mut body = response.into_body();
    next_chunk(&mut body).await;

    let _ = app.shutdown_tx.send(());
    let end = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("stream ends in time");
    assert!(end.is_none());
}
