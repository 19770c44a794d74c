//! Error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use carrel_core::EngineError;
use carrel_shared::AppError;

/// Error returned by handlers; renders as `{"error", "message"}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// Request carried no verified claims.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self(AppError::Unauthorized("Authentication required".to_string()))
    }

    /// Malformed request outside any JSON body.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(AppError::Validation(message.into()))
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err.into())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let body = json!({
            "error": self.0.error_code().to_lowercase(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
