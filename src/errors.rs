use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::ServiceError;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// The single translation point from service-layer outcomes to HTTP.
///
/// Client-caused failures keep their diagnostic message; backend
/// connectivity problems surface as retryable 503s; everything else is
/// logged in full server-side and answered with an opaque 500.
impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(_)
            | ServiceError::Parse(_)
            | ServiceError::OutOfRange { .. } => {
                tracing::warn!("rejected request: {}", err);
                AppError::bad_request(err.to_string())
            }
            ServiceError::NotFound(_) => AppError::not_found(err.to_string()),
            ServiceError::Transient(ref detail) => {
                tracing::error!("storage backend unavailable: {}", detail);
                AppError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage backend unavailable, please retry",
                )
            }
            ServiceError::Sqlx(_) | ServiceError::Io(_) | ServiceError::ObjectStore(_) => {
                tracing::error!("internal error: {:?}", err);
                AppError::internal("Internal server error")
            }
        }
    }
}
