use axum::{
    body::{self, Body},
    http::Request,
};
use tower::ServiceExt;

use super::*;

fn test_app() -> (Router, Arc<Bus>) {
    let bus = Arc::new(Bus::default());
    let app = build_router(AppState {
        bus: Arc::clone(&bus),
    });
    (app, bus)
}

fn publish_request(body: serde_json::Value) -> Request<Body> {
    Request::post("/publish")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _bus) = test_app();
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn retained_publish_is_readable_back() {
    let (app, bus) = test_app();

    let response = app
        .clone()
        .oneshot(publish_request(serde_json::json!({
            "topic": "homeassistant/alarm_control_panel/qolsys_panel/availability",
            "payload": "online",
            "retain": true,
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        bus.retained("homeassistant/alarm_control_panel/qolsys_panel/availability")
            .as_deref(),
        Some("online")
    );

    let response = app
        .oneshot(
            Request::get(
                "/retained?topic=homeassistant/alarm_control_panel/qolsys_panel/availability",
            )
            .body(Body::empty())
            .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let message: BusMessage = serde_json::from_slice(&body).expect("json");
    assert_eq!(message.payload, "online");
    assert!(message.retain);
}

#[tokio::test]
async fn publishing_to_a_wildcard_topic_is_a_bad_request() {
    let (app, _bus) = test_app();
    let response = app
        .oneshot(publish_request(serde_json::json!({
            "topic": "homeassistant/#",
            "payload": "x",
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_retained_topic_is_not_found() {
    let (app, _bus) = test_app();
    let response = app
        .oneshot(
            Request::get("/retained?topic=nothing/here")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
