use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Application error taxonomy.
///
/// Validation and not-found problems are the caller's to fix; stock
/// exhaustion is time-dependent and carries the shortfall so handlers can
/// report it; everything else maps to a 5xx with internal logging.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock: need {required}, only {available} available")]
    InsufficientStock { required: i64, available: i64 },

    #[error("notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "responding with error");
        let (status, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::InsufficientStock { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::NotificationDelivery(m) => (StatusCode::BAD_GATEWAY, m.clone()),
            AppError::Gateway(m) => (StatusCode::BAD_GATEWAY, m.clone()),
            AppError::Auth(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration issue".to_string(),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database operation failed".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "an internal error occurred".to_string(),
            ),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
