//! Game control endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/game/playpause` | `Pause` while autoplay runs, else `Play` |
//! | `POST` | `/game/playpause` | Toggle autoplay; same body as `GET` |
//! | `POST` | `/game/step` | Advance one generation |
//! | `POST` | `/game/clear` | Kill every cell |
//! | `POST` | `/game/cell` | Toggle the cell in form fields `x`, `y` (at most 4 KiB) |
//! | `GET` | `/game/status` | JSON status |
//!
//! The button label is what the user can do next, not the current state.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::{Form, Json};
use tracing::debug;

use crate::error::ObserverError;
use crate::state::{AppState, GameStatus};

/// Largest accepted `POST /game/cell` body, in bytes.
pub const CELL_FORM_LIMIT: usize = 4096;

/// Form body for `POST /game/cell`.
#[derive(Debug, serde::Deserialize)]
pub struct CellForm {
    /// Column of the cell.
    pub x: usize,
    /// Row of the cell.
    pub y: usize,
}

const fn playpause_label(running: bool) -> &'static str {
    if running { "Pause" } else { "Play" }
}

/// Report the play/pause button label.
pub async fn get_playpause(State(state): State<Arc<AppState>>) -> &'static str {
    playpause_label(state.engine.is_running())
}

/// Toggle autoplay and report the new button label.
pub async fn post_playpause(State(state): State<Arc<AppState>>) -> &'static str {
    let running = state.engine.toggle_run();
    debug!(running, "autoplay toggled");
    playpause_label(running)
}

/// Advance one generation.
pub async fn post_step(State(state): State<Arc<AppState>>) -> StatusCode {
    let step = state.engine.advance();
    debug!(step, "manual step");
    StatusCode::OK
}

/// Clear the grid.
pub async fn post_clear(State(state): State<Arc<AppState>>) -> StatusCode {
    let step = state.engine.clear();
    debug!(step, "grid cleared");
    StatusCode::OK
}

/// Toggle one cell and return its re-rendered fragment.
pub async fn post_cell(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CellForm>,
) -> Result<Html<String>, ObserverError> {
    let value = state.engine.toggle_cell(form.x, form.y)?;
    let html = state.renderer.cell(form.x, form.y, value)?;
    Ok(Html(html))
}

/// Current engine and queue status.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<GameStatus> {
    Json(state.status())
}
