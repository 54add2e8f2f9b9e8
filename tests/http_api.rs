//! HTTP API tests against the full router, driven with `tower::ServiceExt::oneshot`

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use door_open_service::config::Settings;
use door_open_service::device::DeviceFrame;
use door_open_service::server::{create_app, AppState};
use door_open_service::stats::MemoryStatsBackend;

fn test_state(api_key: Option<&str>) -> AppState {
    let mut settings = Settings::default();
    settings.api.key = api_key.map(str::to_string);
    AppState::new(settings, Arc::new(MemoryStatsBackend::new()), None).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = create_app(test_state(Some("secret")));
    let (status, body) = send(app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["stats_store"]["backend"], "memory");
    assert_eq!(body["devices"]["total"], 0);
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let state = test_state(Some("secret"));

    let (status, body) = send(create_app(state.clone()), get("/api/v1/usage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/v1/usage")
        .header("X-API-Key", "secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(create_app(state), request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_usage_without_data() {
    let app = create_app(test_state(None));
    let (status, body) = send(app, get("/api/v1/usage")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_data");
}

#[tokio::test]
async fn test_open_unavailable_channel() {
    let app = create_app(test_state(None));
    let request = post_json(
        "/api/v1/channels/garage/open",
        json!({ "requester": { "name": "bob", "contact": "bob@example.com" } }),
    );
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unavailable");
    assert_eq!(body["channel"], "garage");
}

#[tokio::test]
async fn test_open_requires_requester_name() {
    let state = test_state(None);
    let (tx, _rx) = mpsc::channel(4);
    state.registry.register("door", tx).unwrap();

    let request = post_json("/api/v1/channels/door/open", json!({ "requester": { "name": "  " } }));
    let (status, body) = send(create_app(state.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let request = post_json("/api/v1/channels/door/open", json!({}));
    let (status, _) = send(create_app(state.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(state.stats_store.event_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_open_then_usage() {
    let state = test_state(None);
    let (tx, mut rx) = mpsc::channel(4);
    state.registry.register("door", tx).unwrap();

    let request = post_json(
        "/api/v1/channels/door/open",
        json!({ "requester": { "name": "alice", "contact": "alice@example.com" } }),
    );
    let (status, body) = send(create_app(state.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "opening");
    assert_eq!(body["hold_open_ms"], 2500);
    assert_eq!(body["requester"]["name"], "alice");
    assert_eq!(
        body["message"],
        "Opening the door as requested by alice (alice@example.com)..."
    );
    assert_eq!(rx.recv().await, Some(DeviceFrame::Command("2500".into())));

    let (status, usage) = send(create_app(state), get("/api/v1/usage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["status"], "ok");
    assert_eq!(usage["total"], 1);
    assert_eq!(usage["channels"]["door"], 1);
    assert_eq!(usage["estimated_seconds_saved"], 40);
    assert_eq!(usage["since"], body["opened_at"]);
    assert!(usage["channels"].get("garage").is_none());
}

#[tokio::test]
async fn test_channel_listing_and_detail() {
    let state = test_state(None);
    let (tx, _rx) = mpsc::channel(4);
    state.registry.register("gate", tx).unwrap();

    let (status, body) = send(create_app(state.clone()), get("/api/v1/channels")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["channel"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["door", "garage", "gate"]);

    let (status, body) = send(create_app(state.clone()), get("/api/v1/channels/gate")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);
    assert_eq!(body["devices"], 1);

    let (status, body) = send(create_app(state.clone()), get("/api/v1/channels/door")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);

    let (status, body) = send(create_app(state), get("/api/v1/channels/shed")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_arbitrary_channel_names_do_not_grow_metric_series() {
    let state = test_state(None);

    for i in 0..200 {
        let request = post_json(
            &format!("/api/v1/channels/scan{}/open", i),
            json!({ "requester": { "name": "mallory" } }),
        );
        let (status, body) = send(create_app(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "unavailable");
    }

    let response = create_app(state).oneshot(get("/metrics")).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(!text.contains("scan"));
    assert!(text.contains(r#"door_opens_unavailable_total{channel="other"}"#));
}

#[tokio::test]
async fn test_stats_reports_recorded_opens() {
    let state = test_state(None);
    let (tx, _rx) = mpsc::channel(4);
    state.registry.register("door", tx).unwrap();

    let request = post_json("/api/v1/channels/door/open", json!({ "requester": { "name": "alice" } }));
    let (status, _) = send(create_app(state.clone()), request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(create_app(state), get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recorded_opens"], 1);
    assert_eq!(body["devices"]["channels"]["door"], 1);
    assert_eq!(body["relay"]["total_broadcasts"], 1);
}

#[tokio::test]
async fn test_device_handshake_rejects_bad_channel() {
    let state = test_state(None);

    for uri in ["/ws/device", "/ws/device?channel=", "/ws/device?channel=front%20door"] {
        let response = create_app(state.clone()).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
    assert_eq!(state.registry.device_count(), 0);
}

#[tokio::test]
async fn test_device_handshake_rejects_bad_token() {
    let mut settings = Settings::default();
    settings.devices.token = Some("device-secret".to_string());
    let state = AppState::new(settings, Arc::new(MemoryStatsBackend::new()), None).unwrap();

    let response = create_app(state.clone())
        .oneshot(get("/ws/device?channel=door"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = create_app(state.clone())
        .oneshot(get("/ws/device?channel=door&token=wrong"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A good token passes validation; oneshot has no connection to upgrade
    let request = Request::builder()
        .uri("/ws/device?channel=door&token=device-secret")
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap();
    let response = create_app(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
    assert_eq!(state.registry.device_count(), 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_app(test_state(None));
    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("door_devices_connected"));
}
