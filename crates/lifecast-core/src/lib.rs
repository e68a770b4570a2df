//! Simulation engine for lifecast.
//!
//! This crate owns the shared Life grid and the protocol that turns every
//! mutation into a numbered step observed by registered callbacks.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `lifecast-config.yaml` into
//!   strongly-typed structs.
//! - [`engine`] -- [`Engine`]: locking, step counter, callbacks, autoplay.
//! - [`grid`] -- [`Grid`] storage and the neighbor rule.
//!
//! [`Engine`]: engine::Engine
//! [`Grid`]: grid::Grid

pub mod config;
pub mod engine;
pub mod grid;

pub use config::{ConfigError, LifecastConfig};
pub use engine::{
    CallbackHandle, Engine, EngineError, GridSnapshot, StepKind, StepView,
    DEFAULT_AUTOPLAY_INTERVAL, MIN_AUTOPLAY_INTERVAL,
};
pub use grid::{CellChange, Grid};
