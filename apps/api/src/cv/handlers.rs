use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cv::extract::looks_like_pdf;
use crate::cv::models::CvData;
use crate::cv::similarity::{find_similar_profiles, SimilarProfile, DEFAULT_LIMIT};
use crate::cv::status::{ProcessingStatus, StatusRecord};
use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::locks::{UploadLease, UploadLocks};

const UPLOAD_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub user_id: Uuid,
    /// Process inline and answer with the final status record.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Deserialize)]
pub struct SimilarQuery {
    pub user_id: Uuid,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    pub user_id: Uuid,
    pub status: ProcessingStatus,
    pub progress: u8,
}

/// POST /api/v1/cv/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let user_id = params.user_id;
    state
        .store
        .user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    let document = read_cv_upload(&mut multipart, state.config.max_upload_bytes).await?;

    let lease = state.locks.try_acquire(user_id).await?.ok_or_else(|| {
        AppError::Conflict(format!(
            "A CV upload is already being processed for user {user_id}"
        ))
    })?;

    let prepared = async {
        let key = state.archive.store_cv(user_id, document.clone()).await?;
        let tracker = state.processor.begin(user_id).await?;
        Ok::<_, AppError>((key, tracker))
    }
    .await;
    let (key, tracker) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            release_lease(state.locks.as_ref(), lease).await;
            return Err(e);
        }
    };

    let accepted = UploadAccepted {
        user_id,
        status: tracker.record().status,
        progress: tracker.record().progress,
    };

    // Own task: a dropped request future must not stop a run mid-stage or strand the lock.
    let processor = state.processor.clone();
    let locks = state.locks.clone();
    let run = tokio::spawn(async move {
        let outcome = processor.run(tracker, document, Some(key)).await;
        release_lease(locks.as_ref(), lease).await;
        outcome
    });

    if params.wait {
        run.await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("CV processing task failed: {e}"))
        })??;

        let record = state
            .store
            .status(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No CV status for user {user_id}")))?;
        return Ok(Json(record).into_response());
    }

    info!("Accepted CV upload for user {user_id}");
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

/// GET /api/v1/cv/status
pub async fn handle_status(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<StatusRecord>, AppError> {
    let record = state.store.status(params.user_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("No CV processing status for user {}", params.user_id))
    })?;
    Ok(Json(record))
}

/// GET /api/v1/cv
pub async fn handle_get_cv(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<CvData>, AppError> {
    let cv = state
        .store
        .cv(params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No processed CV for user {}", params.user_id)))?;
    Ok(Json(cv))
}

/// GET /api/v1/cv/similar
pub async fn handle_similar(
    State(state): State<AppState>,
    Query(params): Query<SimilarQuery>,
) -> Result<Json<Vec<SimilarProfile>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let profiles = find_similar_profiles(state.store.as_ref(), params.user_id, limit).await?;
    Ok(Json(profiles))
}

/// Pulls the `file` field out of the form and checks it is a non-empty PDF.
async fn read_cv_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<Bytes, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let named_pdf = field
            .file_name()
            .map(|name| name.to_lowercase().ends_with(".pdf"))
            .unwrap_or(false);
        let typed_pdf = field.content_type() == Some("application/pdf");
        let data = field.bytes().await.map_err(multipart_error)?;

        if data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }
        if data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "CV must be at most {max_bytes} bytes"
            )));
        }
        if !(named_pdf || typed_pdf) || !looks_like_pdf(&data) {
            return Err(AppError::Validation("Only PDF files are accepted".into()));
        }
        return Ok(data);
    }

    Err(AppError::Validation(format!(
        "Multipart field '{UPLOAD_FIELD}' is required"
    )))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(err.body_text())
    }
}

async fn release_lease(locks: &dyn UploadLocks, lease: UploadLease) {
    let user_id = lease.user_id;
    if let Err(e) = locks.release(lease).await {
        warn!("Failed to release upload lock for user {user_id}: {e}");
    }
}
