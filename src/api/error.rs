use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy of the processing pipeline.
///
/// `InvalidRequest` and `EmptyResult` are client-caused and map to 4xx;
/// `ProcessingFailure` and `MaterializationFailure` are 5xx. Whatever the
/// variant, every stored file the request created is released before the
/// response leaves.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Processing failed: {0}")]
    ProcessingFailure(String),

    #[error("No file uploaded or processed.")]
    EmptyResult,

    #[error("Materialization failed: {0}")]
    MaterializationFailure(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ProcessingFailure(msg) => {
                tracing::error!("Processing failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::EmptyResult => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "No file uploaded or processed.".to_string(),
            ),
            AppError::MaterializationFailure(msg) => {
                tracing::error!("Materialization failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
