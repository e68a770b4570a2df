//! Error types for the lifecast binary.
//!
//! [`AppError`] is the top-level error type that wraps every failure mode
//! during startup, serving, and shutdown.

/// Top-level error for the lifecast binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: lifecast_core::ConfigError,
    },

    /// The event queue could not be created or cleaned up.
    #[error("queue error: {source}")]
    Queue {
        /// The underlying queue error.
        #[from]
        source: lifecast_queue::QueueError,
    },

    /// Templates failed to compile.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying observer error.
        #[from]
        source: lifecast_observer::ObserverError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: lifecast_observer::ServerError,
    },
}
