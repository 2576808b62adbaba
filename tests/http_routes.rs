//! Control protocol tests: routing, auth and the JSON shapes of responses.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use common::*;

const PASSWORD: &str = "youshallnotpass";

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, PASSWORD)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, PASSWORD)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// ===== Auth =====

#[tokio::test]
async fn test_missing_auth_is_rejected() {
    let h = Harness::new();
    let request = Request::builder()
        .uri("/music/1/status")
        .body(Body::empty())
        .unwrap();

    let response = h.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("Guildbeat-Version"));

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], 401);
    assert_eq!(body["reason"], "Unauthorized");
    assert_eq!(body["path"], "/music/1/status");
}

#[tokio::test]
async fn test_wrong_auth_is_rejected() {
    let h = Harness::new();
    let request = Request::builder()
        .uri("/version")
        .header(header::AUTHORIZATION, "guess")
        .body(Body::empty())
        .unwrap();

    let response = h.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ===== Info =====

#[tokio::test]
async fn test_version() {
    let h = Harness::new();
    let response = h.router().oneshot(get("/version")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["name"], "guildbeat");
    assert!(body["version"].is_string());
}

// ===== Music =====

#[tokio::test]
async fn test_status_without_session() {
    let h = Harness::new();
    let response = h.router().oneshot(get("/music/1/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["playing"], false);
    assert!(body["track"].is_null());
    assert_eq!(body["queueSize"], 0);
    assert_eq!(body["volume"], 100);
    assert_eq!(body["loopMode"], "off");
    assert_eq!(body["state"], "idle");
}

#[tokio::test]
async fn test_queue_without_session() {
    let h = Harness::new();
    let response = h.router().oneshot(get("/music/1/queue")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["current"].is_null());
    assert_eq!(body["tracks"], json!([]));
}

#[tokio::test]
async fn test_play_then_queue() {
    let h = Harness::new();

    let play = post(
        "/music/7/play",
        json!({ "query": "song A", "voiceChannelId": "500", "requestedBy": "42" }),
    );
    let response = h.router().oneshot(play).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["started"], true);
    assert_eq!(body["track"]["title"], "song A");
    assert_eq!(body["track"]["requestedBy"], "42");

    let second = post("/music/7/play", json!({ "query": "song B", "voiceChannelId": 500 }));
    let body = extract_json(h.router().oneshot(second).await.unwrap().into_body()).await;
    assert_eq!(body["started"], false);
    assert_eq!(body["queueSize"], 1);

    let body = extract_json(h.router().oneshot(get("/music/7/queue")).await.unwrap().into_body()).await;
    assert_eq!(body["current"]["title"], "song A");
    assert_eq!(body["tracks"][0]["index"], 0);
    assert_eq!(body["tracks"][0]["title"], "song B");
}

#[tokio::test]
async fn test_play_without_query() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(post("/music/7/play", json!({ "voiceChannelId": "500" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], 400);
    assert_eq!(body["path"], "/music/7/play");
}

#[tokio::test]
async fn test_play_malformed_body() {
    let h = Harness::new();
    let request = Request::builder()
        .method("POST")
        .uri("/music/7/play")
        .header(header::AUTHORIZATION, PASSWORD)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = h.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_play_without_results() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(post(
            "/music/7/play",
            json!({ "query": "nothing", "voiceChannelId": "500" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("nothing"));
}

#[tokio::test]
async fn test_volume_out_of_range() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(post("/music/7/volume", json!({ "volume": 150 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_volume_without_session() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(post("/music/7/volume", json!({ "volume": 40 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_skip_and_pause_without_session() {
    let h = Harness::new();
    for path in ["/music/7/skip", "/music/7/pause", "/music/7/resume"] {
        let response = h.router().oneshot(post(path, json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
    }
}

#[tokio::test]
async fn test_stop_always_succeeds() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(post("/music/7/stop", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["success"], true);
}

#[tokio::test]
async fn test_loop_rejects_unknown_mode() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(post("/music/7/loop", json!({ "mode": "sometimes" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_voice_channels() {
    let h = Harness::new();

    let response = h.router().oneshot(get("/music/known/voice-channels")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["channels"][0]["id"], "500");
    assert_eq!(body["channels"][0]["name"], "Lounge");

    let response = h.router().oneshot(get("/music/unknown/voice-channels")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
