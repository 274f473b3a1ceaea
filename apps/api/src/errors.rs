use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cv::pipeline::PipelineError;
use crate::storage::archive::ArchiveError;
use crate::storage::locks::LockError;
use crate::storage::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Store(StoreError::Duplicate(what)) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{what} already exists"),
            ),
            AppError::Store(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Pipeline(e) => {
                tracing::error!("CV processing error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CV_PROCESSING_ERROR",
                    "CV processing failed".to_string(),
                )
            }
            AppError::Archive(e) => {
                tracing::error!("Archive error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "S3_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Lock(e) => {
                tracing::error!("Upload lock error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LOCK_ERROR",
                    "Could not coordinate the upload".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::extract::ExtractError;
    use crate::cv::status::PipelineStage;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_maps_to_conflict() {
        let response =
            AppError::Store(StoreError::Duplicate("user with email a@b.io".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_pipeline_error_is_generic_500() {
        let err = PipelineError::new(PipelineStage::ExtractText, ExtractError::Encrypted);
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "CV_PROCESSING_ERROR");
        assert_eq!(body["error"]["message"], "CV processing failed");
    }

    #[tokio::test]
    async fn test_client_errors_keep_message() {
        let response = AppError::Validation("file must be a PDF".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "file must be a PDF");
    }
}
