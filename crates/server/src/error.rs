use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use splitty_core::{CurrencyError, SplitError};
use splitty_ocr::PipelineError;
use thiserror::Error;

/// Every failure an endpoint can report. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid request body: {}", .0.body_text())]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Currency(#[from] CurrencyError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("Failed to process receipt: {0}")]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Json(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::BadRequest(_)
            | ApiError::Json(_)
            | ApiError::Currency(_)
            | ApiError::Split(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::NothingRecognized) => StatusCode::BAD_GATEWAY,
            ApiError::Pipeline(PipelineError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::warn!(%status, error = %message, "request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
