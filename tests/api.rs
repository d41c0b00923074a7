//! HTTP-level tests driving the full router in process.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use presence_gateway::app_state::AppState;
use presence_gateway::build_app;
use presence_gateway::domain::{ConnectionRegistry, InMemoryPresenceStore, TracingReporter};
use presence_gateway::service::PresenceService;

fn make_state() -> AppState {
    AppState {
        presence_service: PresenceService::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(InMemoryPresenceStore::new()),
            Arc::new(TracingReporter),
        ),
        identity_header: "x-user-id".to_string(),
        sse_keep_alive: Duration::from_secs(15),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let Ok(collected) = response.into_body().collect().await else {
        panic!("body failed");
    };
    let body = serde_json::from_slice(&collected.to_bytes()).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    let Ok(request) = Request::get(uri).body(Body::empty()) else {
        panic!("valid request");
    };
    request
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    let Ok(request) = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
    else {
        panic!("valid request");
    };
    request
}

fn open_stream(identity: &str) -> Request<Body> {
    let Ok(request) = Request::get("/api/v1/events/stream")
        .header("x-user-id", identity)
        .body(Body::empty())
    else {
        panic!("valid request");
    };
    request
}

/// Reads SSE frames until one carries a JSON payload.
async fn next_event(body: &mut Body) -> Value {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), body.frame()).await;
        let Ok(Some(Ok(frame))) = next else {
            panic!("stream ended or timed out");
        };
        let Ok(data) = frame.into_data() else {
            continue;
        };
        let text = String::from_utf8_lossy(&data).into_owned();
        if let Some(payload) = text
            .lines()
            .find_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
        {
            return serde_json::from_str(payload).unwrap_or(Value::Null);
        }
    }
}

async fn stream_body(app: &Router, identity: &str) -> Body {
    let Ok(response) = app.clone().oneshot(open_stream(identity)).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body()
}

#[tokio::test]
async fn health_reports_connection_count() {
    let app = build_app(make_state());
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn stream_without_identity_is_unauthenticated() {
    let app = build_app(make_state());
    let (status, body) = send(&app, get("/api/v1/events/stream")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 1003);

    let (status, _) = send(&app, open_stream("   ")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stream_starts_with_connected_frame() {
    let state = make_state();
    let service = state.presence_service.clone();
    let app = build_app(state);

    let mut body = stream_body(&app, "42").await;
    let first = next_event(&mut body).await;
    assert_eq!(first, json!({"type": "connected", "identity": "42"}));

    let online = next_event(&mut body).await;
    assert_eq!(online["type"], "presence-changed");
    assert_eq!(online["status"], "online");
    assert_eq!(service.connection_count(), 1);

    let (status, body_json) = send(&app, get("/api/v1/presence")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_json, json!({"identities": ["42"], "count": 1}));
}

#[tokio::test]
async fn published_event_reaches_open_stream() {
    let app = build_app(make_state());
    let mut body = stream_body(&app, "42").await;
    let _connected = next_event(&mut body).await;
    let _online = next_event(&mut body).await;

    let (status, report) = send(
        &app,
        post_json(
            "/api/v1/events",
            &json!({"event": {"type": "new-message", "from": "7", "text": "hi"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(report["attempted"], 1);
    assert_eq!(report["delivered"], 1);

    let event = next_event(&mut body).await;
    assert_eq!(event["type"], "new-message");
    assert_eq!(event["text"], "hi");
}

#[tokio::test]
async fn targeted_event_skips_other_streams() {
    let app = build_app(make_state());
    let mut a = stream_body(&app, "1").await;
    let _ = next_event(&mut a).await;
    let _ = next_event(&mut a).await;
    let mut b = stream_body(&app, "2").await;
    let _ = next_event(&mut b).await;
    let _ = next_event(&mut b).await;
    // "1" also sees "2" come online
    let peer = next_event(&mut a).await;
    assert_eq!(peer["identity"], "2");

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/events",
            &json!({"to": "2", "event": {"type": "lease-signed"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(next_event(&mut b).await["type"], "lease-signed");

    let (status, _) = send(
        &app,
        post_json("/api/v1/events", &json!({"event": {"type": "ping"}})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(next_event(&mut a).await["type"], "ping");
}

#[tokio::test]
async fn reserved_or_malformed_events_are_rejected() {
    let app = build_app(make_state());

    let (status, body) = send(
        &app,
        post_json("/api/v1/events", &json!({"event": {"type": "connected"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);

    let (status, _) = send(
        &app,
        post_json("/api/v1/events", &json!({"event": {"text": "no type"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/events",
            &json!({"to": "nobody", "event": {"type": "ping"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn unknown_presence_and_session_are_not_found() {
    let app = build_app(make_state());

    let (status, body) = send(&app, get("/api/v1/presence/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2002);

    let Ok(request) = Request::delete("/api/v1/sessions/nobody").body(Body::empty()) else {
        panic!("valid request");
    };
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn closing_session_ends_stream_and_marks_offline() {
    let state = make_state();
    let service = state.presence_service.clone();
    let app = build_app(state);

    let mut body = stream_body(&app, "42").await;
    let _ = next_event(&mut body).await;
    let _ = next_event(&mut body).await;

    let Ok(request) = Request::delete("/api/v1/sessions/42").body(Body::empty()) else {
        panic!("valid request");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let ended = tokio::time::timeout(Duration::from_secs(2), body.collect()).await;
    assert!(matches!(ended, Ok(Ok(_))), "stream did not end");
    assert_eq!(service.connection_count(), 0);

    let (status, presence) = send(&app, get("/api/v1/presence/42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(presence["connected"], false);
    assert_eq!(presence["status"], "offline");
}

#[tokio::test]
async fn dropping_stream_disconnects_client() {
    let state = make_state();
    let service = state.presence_service.clone();
    let app = build_app(state);

    let mut body = stream_body(&app, "42").await;
    let _ = next_event(&mut body).await;
    let _ = next_event(&mut body).await;
    drop(body);

    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while service.connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "session stayed registered");
}
