//! Axum router construction for the observer.
//!
//! Assembles the game endpoints and the event stream into a single
//! [`Router`]; anything else falls through to static files.

use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::predicate::SizeAbove;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::sse;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /game/sse` -- server-sent-event grid stream, deflate-compressed
/// - `GET|POST /game/playpause` -- autoplay label / toggle
/// - `POST /game/step` -- advance one generation
/// - `POST /game/clear` -- clear the grid
/// - `POST /game/cell` -- toggle one cell (form body capped at
///   [`CELL_FORM_LIMIT`](handlers::CELL_FORM_LIMIT) bytes)
/// - `GET /game/status` -- JSON status
/// - everything else -- files under `static_dir`
pub fn build_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        // The default predicate skips `text/event-stream`; this route
        // always compresses.
        .route(
            "/game/sse",
            get(sse::game_sse).layer(CompressionLayer::new().compress_when(SizeAbove::new(0))),
        )
        .route(
            "/game/playpause",
            get(handlers::get_playpause).post(handlers::post_playpause),
        )
        .route("/game/step", post(handlers::post_step))
        .route("/game/clear", post(handlers::post_clear))
        .route(
            "/game/cell",
            post(handlers::post_cell).layer(DefaultBodyLimit::max(handlers::CELL_FORM_LIMIT)),
        )
        .route("/game/status", get(handlers::get_status))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
