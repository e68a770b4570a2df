//! Browser front end for the Lifecast simulation.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Server-sent-event endpoint** (`/game/sse`) that sends the whole
//!   field once and then replays per-step cell updates from the
//!   [`EventQueue`](lifecast_queue::EventQueue)
//! - **Control endpoints** for play/pause, single step, clear, and cell
//!   toggles, driven by htmx forms in the page
//! - **Status endpoint** (`/game/status`) reporting step, autoplay, and
//!   queue progress as JSON
//! - **Static files** for every other path
//!
//! # Architecture
//!
//! Handlers never render from live engine state except for the initial
//! full field, which is rendered under the engine lock together with the
//! step it belongs to. Every later update comes from the queue, so each
//! client sees every step exactly once and in order.

pub mod error;
pub mod handlers;
pub mod render;
pub mod router;
pub mod server;
pub mod sse;
pub mod state;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use render::Renderer;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::{AppState, GameStatus};
