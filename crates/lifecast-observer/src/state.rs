//! Shared application state for the observer HTTP server.
//!
//! [`AppState`] bundles the engine, the event queue, the renderer, and the
//! shutdown signal that ends every open event stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lifecast_core::Engine;
use lifecast_queue::{Cancellation, EventQueue};

use crate::error::ObserverError;
use crate::render::Renderer;

/// JSON status served by `GET /game/status`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GameStatus {
    /// Current engine step.
    pub step: u64,
    /// Whether autoplay is active.
    pub running: bool,
    /// Milliseconds between autoplay steps.
    pub interval_ms: u64,
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Highest step stored in the event queue.
    pub high_water_mark: u64,
    /// Number of open event streams.
    pub connected_clients: u64,
    /// ISO 8601 timestamp of when the server state was created.
    pub started_at: String,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// The simulation engine.
    pub engine: Engine,
    /// The per-step event log.
    pub queue: EventQueue,
    /// Cell and field renderer.
    pub renderer: Arc<Renderer>,
    /// Fired at shutdown; ends every event stream.
    pub shutdown: Cancellation,
    next_client_id: AtomicU64,
    connected_clients: AtomicU64,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state around an engine and queue.
    pub fn new(engine: Engine, queue: EventQueue, renderer: Arc<Renderer>) -> Self {
        Self {
            engine,
            queue,
            renderer,
            shutdown: Cancellation::new(),
            next_client_id: AtomicU64::new(1),
            connected_clients: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Create state with a freshly compiled renderer.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Render`] if the templates fail to compile.
    pub fn with_default_renderer(engine: Engine, queue: EventQueue) -> Result<Self, ObserverError> {
        Ok(Self::new(engine, queue, Arc::new(Renderer::new()?)))
    }

    /// Register a new event-stream client and return its id.
    pub fn client_connected(&self) -> u64 {
        self.connected_clients.fetch_add(1, Ordering::Relaxed);
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Record that an event-stream client went away.
    pub fn client_disconnected(&self) {
        let _ = self
            .connected_clients
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Number of open event streams.
    pub fn connected_clients(&self) -> u64 {
        self.connected_clients.load(Ordering::Relaxed)
    }

    /// Gather the status snapshot.
    pub fn status(&self) -> GameStatus {
        let (rows, cols) = self.engine.dimensions();
        GameStatus {
            step: self.engine.step(),
            running: self.engine.is_running(),
            interval_ms: u64::try_from(self.engine.interval().as_millis()).unwrap_or(u64::MAX),
            rows,
            cols,
            high_water_mark: self.queue.high_water_mark(),
            connected_clients: self.connected_clients(),
            started_at: self.started_at.to_rfc3339(),
        }
    }
}
