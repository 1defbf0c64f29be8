//! Error types for fedilookup
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// `InvalidHandle` and `ActorNotFound` are user-facing; everything else
/// is an operator or transport concern.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed `@user@host` input, rejected before any network call
    #[error("Invalid fediverse handle: {0}")]
    InvalidHandle(String),

    /// WebFinger discovery or actor fetch failed, for any reason
    #[error("Unknown user {0}")]
    ActorNotFound(String),

    /// Network or timeout error from an outbound request
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request signing failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidHandle(_) => "invalid_handle",
            AppError::ActorNotFound(_) => "actor_not_found",
            AppError::Transport(_) => "transport",
            AppError::Signing(_) => "signing",
            AppError::Validation(_) => "validation",
            AppError::NotFound => "not_found",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::ActorNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidHandle(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Transport(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Signing(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signing error".to_string(),
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind()])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
