use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::agent::AgentError;
use crate::evaluation::request_builder::BuildError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    MissingInput(String),

    #[error("Please provide all API keys and model ID.")]
    MissingCredentials,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Agent invocation failed: {0}")]
    Invocation(#[from] AgentError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<BuildError> for AppError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::MissingInput(_) => AppError::MissingInput(err.to_string()),
            BuildError::MissingCredentials => AppError::MissingCredentials,
        }
    }
}

impl AppError {
    /// Machine-readable code carried in error bodies and stream `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::MissingInput(_) => "MISSING_INPUT",
            AppError::MissingCredentials => "MISSING_CREDENTIALS",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Invocation(_) => "INVOCATION_FAILURE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::MissingInput(_) | AppError::MissingCredentials => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Invocation(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
