use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ocr_profiler_core::ProfileError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error returned by every handler.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

impl From<ocr_profiler_core::error::StorageError> for AppError {
    fn from(e: ocr_profiler_core::error::StorageError) -> Self {
        Self::Profile(e.into())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Profile(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
