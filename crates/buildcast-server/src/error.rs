//! Error types for the Buildcast HTTP API.
//!
//! [`ApiError`] unifies handler failures into a single enum that converts
//! into an Axum response via its [`IntoResponse`] implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use buildcast_core::ControllerError;

/// Errors that can occur while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No build target with this name is configured.
    #[error("unknown build target: {0}")]
    UnknownTarget(String),

    /// The target's session controller has shut down.
    #[error(transparent)]
    Unavailable(#[from] ControllerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownTarget(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
