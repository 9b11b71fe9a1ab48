//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use linebatch_common::LinebatchError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for handlers and coordinator operations
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error types
///
/// Every variant renders as `{"status": "error", "message": ...}` so workers only ever
/// look at the `status` field.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request was well-formed but does not apply to the current state
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Linebatch(#[from] LinebatchError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::Linebatch(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::BadRequest(message) | AppError::Rejected(message) => message,
            AppError::Linebatch(ref e) => {
                tracing::error!("Coordinator state error: {:?}", e);
                e.to_string()
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                message
            },
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}
