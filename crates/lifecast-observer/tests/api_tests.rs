//! Integration tests for the observer endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Event stream contents are read chunk by chunk
//! from the handler's uncompressed response; the route-level tests cover
//! deflate encoding.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures::StreamExt as _;
use lifecast_core::{Engine, Grid};
use lifecast_observer::handlers::CELL_FORM_LIMIT;
use lifecast_observer::router::build_router;
use lifecast_observer::sse::game_sse;
use lifecast_observer::state::AppState;
use lifecast_queue::EventQueue;
use serde_json::Value;
use tower::{Layer, ServiceExt};
use tower_http::decompression::DecompressionLayer;

async fn make_test_state() -> Arc<AppState> {
    // Horizontal blinker in the middle of a 5x5 field.
    let engine = Engine::new(
        Grid::with_live_cells(5, 5, &[(1, 2), (2, 2), (3, 2)]),
        Duration::from_millis(500),
    );
    let queue = EventQueue::create(Some(&std::env::temp_dir())).await.unwrap();
    Arc::new(AppState::with_default_renderer(engine, queue).unwrap())
}

fn static_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("static")
}

fn app(state: &Arc<AppState>) -> Router {
    build_router(Arc::clone(state), &static_dir())
}

async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_cell(x: usize, y: usize) -> Request<Body> {
    Request::post("/game/cell")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("x={x}&y={y}")))
        .unwrap()
}

async fn cleanup(state: &AppState) {
    state.engine.stop();
    state.queue.delete_all_steps().await.unwrap();
}

// =========================================================================
// Control endpoints
// =========================================================================

#[tokio::test]
async fn test_post_cell_toggles_and_returns_fragment() {
    let state = make_test_state().await;

    let response = app(&state).oneshot(post_cell(1, 0)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_to_string(response.into_body()).await;
    assert!(html.starts_with("<form"));
    assert!(html.contains(r#"class="black""#));
    assert!(html.contains(r#"sse-swap="cell1-0""#));
    assert_eq!(state.engine.step(), 1);
    assert!(state.engine.read(|grid, _| grid.is_alive(1, 0)));

    // Toggling again kills the cell.
    let response = app(&state).oneshot(post_cell(1, 0)).await.unwrap();
    let html = body_to_string(response.into_body()).await;
    assert!(!html.contains("black"));
    assert_eq!(state.engine.step(), 2);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_post_cell_rejects_oversized_body() {
    let state = make_test_state().await;
    let padding = "a".repeat(CELL_FORM_LIMIT);
    let request = Request::post("/game/cell")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("x=1&y=0&pad={padding}")))
        .unwrap();

    let response = app(&state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(state.engine.step(), 0);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_post_cell_out_of_bounds_is_bad_request() {
    let state = make_test_state().await;

    let response = app(&state).oneshot(post_cell(5, 0)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("(5, 0)"));
    assert_eq!(state.engine.step(), 0);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_playpause_reports_next_action() {
    let state = make_test_state().await;

    let response = app(&state)
        .oneshot(Request::get("/game/playpause").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response.into_body()).await, "Play");

    let response = app(&state).oneshot(post("/game/playpause")).await.unwrap();
    assert_eq!(body_to_string(response.into_body()).await, "Pause");
    assert!(state.engine.is_running());

    let response = app(&state)
        .oneshot(Request::get("/game/playpause").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_to_string(response.into_body()).await, "Pause");

    let response = app(&state).oneshot(post("/game/playpause")).await.unwrap();
    assert_eq!(body_to_string(response.into_body()).await, "Play");
    assert!(!state.engine.is_running());

    cleanup(&state).await;
}

#[tokio::test]
async fn test_post_step_advances_one_generation() {
    let state = make_test_state().await;

    let response = app(&state).oneshot(post("/game/step")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.engine.step(), 1);
    let vertical = state
        .engine
        .read(|grid, _| grid.is_alive(2, 1) && grid.is_alive(2, 2) && grid.is_alive(2, 3));
    assert!(vertical);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_post_clear_kills_every_cell() {
    let state = make_test_state().await;

    let response = app(&state).oneshot(post("/game/clear")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.engine.step(), 1);
    assert_eq!(state.engine.read(|grid, _| grid.live_count()), 0);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_step_requires_post() {
    let state = make_test_state().await;

    let response = app(&state)
        .oneshot(Request::get("/game/step").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(state.engine.step(), 0);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_get_status() {
    let state = make_test_state().await;
    state.engine.advance();
    state.queue.push_step(1, b"").await.unwrap();

    let response = app(&state)
        .oneshot(Request::get("/game/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["step"], 1);
    assert_eq!(json["running"], false);
    assert_eq!(json["interval_ms"], 500);
    assert_eq!(json["rows"], 5);
    assert_eq!(json["cols"], 5);
    assert_eq!(json["high_water_mark"], 1);
    assert_eq!(json["connected_clients"], 0);
    assert!(json["started_at"].as_str().is_some());

    cleanup(&state).await;
}

// =========================================================================
// Event stream
// =========================================================================

async fn open_stream(state: &Arc<AppState>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("deflate"));
    game_sse(State(Arc::clone(state)), headers).await.unwrap()
}

#[tokio::test]
async fn test_sse_sends_full_field_then_queued_steps() {
    let state = make_test_state().await;

    let response = open_stream(&state).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(content_type, "text/event-stream");
    assert_eq!(state.connected_clients(), 1);

    let mut chunks = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), chunks.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert!(first.starts_with("event: all\r\ndata:<div class=\"game-grid\""));
    assert_eq!(first.matches(r#"class="black""#).count(), 3);

    let update = b"event: cell0-0\r\ndata:<form></form>\r\n\r\n";
    state.queue.push_step(1, update).await.unwrap();

    let second = tokio::time::timeout(Duration::from_secs(5), chunks.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second.to_vec(), update.to_vec());

    // Shutdown ends the stream instead of leaving it waiting.
    state.shutdown.cancel();
    let end = tokio::time::timeout(Duration::from_secs(5), chunks.next())
        .await
        .unwrap();
    assert!(end.is_none());

    drop(chunks);
    assert_eq!(state.connected_clients(), 0);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_sse_replays_from_the_rendered_step() {
    let state = make_test_state().await;
    state.engine.advance();
    state.queue.push_step(1, b"old").await.unwrap();

    let response = open_stream(&state).await;
    let mut chunks = response.into_body().into_data_stream();

    let first = chunks.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"event: all\r\n"));

    // Step 1 is already part of the full field; only step 2 follows.
    state.queue.push_step(2, b"new").await.unwrap();
    let next = tokio::time::timeout(Duration::from_secs(5), chunks.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(next.to_vec(), b"new".to_vec());

    state.shutdown.cancel();
    cleanup(&state).await;
}

#[tokio::test]
async fn test_sse_without_deflate_is_not_acceptable() {
    let state = make_test_state().await;

    let response = app(&state)
        .oneshot(
            Request::get("/game/sse")
                .header("accept-encoding", "gzip, br")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(state.connected_clients(), 0);

    let response = app(&state)
        .oneshot(Request::get("/game/sse").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    cleanup(&state).await;
}

#[tokio::test]
async fn test_sse_route_is_deflate_encoded() {
    let state = make_test_state().await;
    // Pre-cancelled: the stream ends right after the full field.
    state.shutdown.cancel();

    let response = app(&state)
        .oneshot(
            Request::get("/game/sse")
                .header("accept-encoding", "deflate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-encoding").unwrap(), "deflate");
    let raw = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!raw.starts_with(b"event: all"));

    // Decoding the same response yields the plain frame.
    let response = DecompressionLayer::new()
        .layer(app(&state))
        .oneshot(
            Request::get("/game/sse")
                .header("accept-encoding", "deflate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_to_string(Body::new(response.into_body())).await;
    assert!(text.starts_with("event: all\r\ndata:<div class=\"game-grid\""));
    assert!(text.ends_with("</div>\r\n\r\n"));

    cleanup(&state).await;
}

// =========================================================================
// Static files
// =========================================================================

#[tokio::test]
async fn test_static_file_is_served() {
    let state = make_test_state().await;

    let response = app(&state)
        .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_to_string(response.into_body()).await;
    assert!(html.contains("lifecast test page"));

    cleanup(&state).await;
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let state = make_test_state().await;

    let response = app(&state)
        .oneshot(Request::get("/nonexistent.js").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    cleanup(&state).await;
}
