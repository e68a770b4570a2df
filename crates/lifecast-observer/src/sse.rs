//! Server-sent-event stream of grid updates.
//!
//! Clients connect to `GET /game/sse`. The first event (`all`) carries the
//! whole field rendered at some step `N`; after that the handler replays
//! the event queue from `N + 1` onward, one pre-rendered record per step.
//!
//! When a client falls behind the retention window the response simply
//! ends. Browsers' `EventSource` reconnects on its own and the new
//! connection starts from a fresh full field.
//!
//! The stream is always deflate-compressed by the route's compression
//! layer. Clients that do not accept `deflate` get `406 Not Acceptable`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use futures::{stream, StreamExt as _};
use lifecast_queue::SubscriptionEnd;
use tracing::{debug, info, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Keeps the connected-client gauge accurate and logs the disconnect when
/// the response body is dropped.
struct ClientGuard {
    state: Arc<AppState>,
    client_id: u64,
}

impl ClientGuard {
    const fn client_id(&self) -> u64 {
        self.client_id
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.state.client_disconnected();
        info!(client_id = self.client_id, "SSE client disconnected");
    }
}

/// Stream the full field followed by every subsequent step.
///
/// # Route
///
/// `GET /game/sse`
pub async fn game_sse(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ObserverError> {
    if !accepts_deflate(&headers) {
        return Err(ObserverError::DeflateRequired);
    }

    let (initial, step) = state
        .engine
        .read(|grid, step| state.renderer.full_field_event(grid).map(|event| (event, step)))?;

    let client_id = state.client_connected();
    info!(client_id, step, "SSE client connected");

    let guard = ClientGuard {
        state: Arc::clone(&state),
        client_id,
    };
    let updates = state
        .queue
        .subscribe(state.shutdown.clone(), step)
        .into_stream()
        .filter_map(move |item| {
            let client_id = guard.client_id();
            async move {
                match item {
                    Ok(event) => {
                        debug!(client_id, bytes = event.len(), "SSE update sent");
                        Some(Ok::<_, Infallible>(event))
                    }
                    Err(end) => {
                        log_end(client_id, &end);
                        None
                    }
                }
            }
        });

    let body = Body::from_stream(stream::once(async move { Ok(initial) }).chain(updates));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Whether `Accept-Encoding` lists `deflate`.
pub fn accepts_deflate(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains("deflate"))
}

fn log_end(client_id: u64, end: &SubscriptionEnd) {
    match end {
        SubscriptionEnd::Cancelled => {
            debug!(client_id, "SSE stream closed by shutdown");
        }
        SubscriptionEnd::FellBehind { step } => {
            warn!(client_id, step, "SSE client fell behind retention window; closing");
        }
        SubscriptionEnd::Storage { step, source } => {
            warn!(client_id, step, error = %source, "SSE stream storage failure; closing");
        }
    }
}
