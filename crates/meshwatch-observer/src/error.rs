//! Error types for the viewer API.
//!
//! [`ObserverError`] converts into an Axum HTTP response with a JSON body
//! of the form `{"error": "...", "status": 400}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the viewer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request body could not be read as the expected JSON.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidBody(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
