use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Twitch API error: {0}")]
    TwitchApi(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    /// Whether [`AppError::parts`] already logs this error.
    fn logs_itself(&self) -> bool {
        !matches!(
            self,
            AppError::Unauthorized
                | AppError::NotFound(_)
                | AppError::BadRequest(_)
                | AppError::Conflict(_)
        )
    }

    /// Status, machine code and client-safe message. Server-side failures are
    /// logged here so that every response path reports them exactly once.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Jwt(e) => {
                tracing::warn!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Request(e) => {
                tracing::error!("HTTP request error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "EXTERNAL_REQUEST_FAILED",
                    "Failed to communicate with external service".to_string(),
                )
            }
            AppError::TwitchApi(msg) => {
                tracing::error!("Twitch API error: {}", msg);
                (StatusCode::BAD_GATEWAY, "TWITCH_API_ERROR", msg.clone())
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "Server configuration error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Flat `{ "error": "..." }` object returned by page loads and form actions
/// in place of their data.
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub error: String,
}

/// Wraps an `AppError` so it renders as an [`ErrorObject`]. Every failure is
/// logged exactly once, whatever its status.
#[derive(Debug)]
pub struct LoadError(pub AppError);

impl From<AppError> for LoadError {
    fn from(error: AppError) -> Self {
        LoadError(error)
    }
}

impl IntoResponse for LoadError {
    fn into_response(self) -> Response {
        if !self.0.logs_itself() {
            tracing::error!("Load failed: {}", self.0);
        }
        let (status, _, message) = self.0.parts();
        (status, Json(ErrorObject { error: message })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
