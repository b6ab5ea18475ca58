use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Upstream catalog or history fetch failed (connect error, timeout, bad status)
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single source record could not be turned into a catalog item
    #[error("Record skipped: {0}")]
    NormalizationSkipped(String),

    #[error("Index mirror failed: {0}")]
    IndexMirrorFailed(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("Missing API token")]
    Unauthorized,

    #[error("Invalid API token")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Snapshot mirror error: {0}")]
    Mirror(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Soft failures degrade a result field but never abort the operation
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            AppError::NormalizationSkipped(_)
                | AppError::IndexMirrorFailed(_)
                | AppError::NotificationFailed(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NormalizationSkipped(_)
            | AppError::IndexMirrorFailed(_)
            | AppError::NotificationFailed(_)
            | AppError::Mirror(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "success": false,
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
