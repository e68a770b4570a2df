//! Error types for the observer HTTP layer.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lifecast_core::EngineError;

/// Errors that can occur in the observer layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The request named a cell outside the grid.
    #[error("{0}")]
    OutOfBounds(#[from] EngineError),

    /// The event stream is only served deflate-compressed.
    #[error("the event stream requires Accept-Encoding: deflate")]
    DeflateRequired,

    /// A template failed to compile or render.
    #[error("render error: {0}")]
    Render(#[from] minijinja::Error),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::OutOfBounds(_) => StatusCode::BAD_REQUEST,
            Self::DeflateRequired => StatusCode::NOT_ACCEPTABLE,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
