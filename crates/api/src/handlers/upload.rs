//! Handlers for the upload protocol: init and complete.
//!
//! `init` allocates a video row and a presigned PUT URL; the client PUTs
//! the object straight to the store; `complete` verifies the object is
//! present, flips the state machine, and enqueues the pipeline task.
//! Processing is asynchronous — pipeline errors are never returned here.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scenedex_core::error::CoreError;
use scenedex_core::state::{JobStage, VideoState};
use scenedex_core::upload::{
    sanitize_filename, upload_object_key, validate_upload_request, UPLOAD_URL_TTL_SECS,
};
use scenedex_db::models::video::CreateVideo;
use scenedex_db::repositories::{JobRepo, QueueRepo, VideoRepo};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InitUploadRequest {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitUploadResponse {
    pub video_id: Uuid,
    /// Presigned PUT URL bound to the declared content type and length.
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteUploadRequest {
    pub video_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub video_id: Uuid,
    pub state: VideoState,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/videos/upload/init
///
/// Validates the request, creates the video row in `uploading` state, and
/// returns a presigned PUT URL (TTL 15 minutes). Every call allocates a
/// fresh `video_id`; clients that miss the URL window simply init again.
pub async fn init_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<InitUploadRequest>,
) -> AppResult<(StatusCode, Json<InitUploadResponse>)> {
    validate_upload_request(&request.filename, &request.mime_type, request.size_bytes)
        .map_err(AppError::Core)?;

    let video_id = Uuid::new_v4();
    let filename = sanitize_filename(&request.filename);
    let storage_key = upload_object_key(user.user_id, video_id, &filename);

    let video = VideoRepo::create(
        &state.pool,
        &CreateVideo {
            video_id,
            user_id: user.user_id,
            storage_key: storage_key.clone(),
            mime_type: request.mime_type.clone(),
            size_bytes: request.size_bytes,
            title: request.title.or(Some(filename)),
            description: request.description,
        },
    )
    .await?;

    let ttl = Duration::from_secs(UPLOAD_URL_TTL_SECS);
    let (upload_url, expires_at) = state
        .storage
        .presign_put(
            &state.storage.config().bucket_uploads,
            &storage_key,
            &request.mime_type,
            request.size_bytes,
            ttl,
        )
        .await?;

    tracing::info!(
        video_id = %video.video_id,
        user_id = %user.user_id,
        storage_key = %storage_key,
        size_bytes = request.size_bytes,
        "Initialized video upload"
    );

    Ok((
        StatusCode::CREATED,
        Json(InitUploadResponse {
            video_id: video.video_id,
            upload_url,
            expires_at,
        }),
    ))
}

/// POST /api/v1/videos/upload/complete
///
/// Verifies the object landed in the store, transitions the video to
/// `validating`, and enqueues the pipeline task — all in one transaction,
/// under a row lock so concurrent calls on the same video serialize.
///
/// Idempotent: a video already past `uploading` reports its current state
/// without re-enqueueing.
pub async fn complete_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CompleteUploadRequest>,
) -> AppResult<Json<CompleteUploadResponse>> {
    let mut tx = state.pool.begin().await?;

    let video = VideoRepo::find_owned_for_update(&mut tx, request.video_id, user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Video",
            id: request.video_id,
        }))?;

    match video.state {
        VideoState::Uploading => {
            let exists = state
                .storage
                .object_exists(&state.storage.config().bucket_uploads, &video.storage_key)
                .await?;
            if !exists {
                // Keep the row in `uploading`; the client retries after the PUT.
                tx.rollback().await?;
                return Err(AppError::Core(CoreError::NotReady(
                    "Uploaded object not yet present".to_string(),
                )));
            }

            VideoRepo::set_state(&mut tx, video.video_id, VideoState::Validating).await?;
            JobRepo::create_pending(&mut tx, video.video_id, JobStage::UploadValidate).await?;
            let task_id = QueueRepo::enqueue(&mut tx, video.video_id).await?;
            tx.commit().await?;

            tracing::info!(
                video_id = %video.video_id,
                user_id = %user.user_id,
                task_id,
                "Upload completed, queued for processing"
            );

            Ok(Json(CompleteUploadResponse {
                video_id: video.video_id,
                state: VideoState::Validating,
            }))
        }

        // Already handed off (or finished): report the current state and
        // do not enqueue again.
        VideoState::Validating
        | VideoState::Processing
        | VideoState::Indexed
        | VideoState::Failed => {
            tx.rollback().await?;
            Ok(Json(CompleteUploadResponse {
                video_id: video.video_id,
                state: video.state,
            }))
        }

        // A deleted video is indistinguishable from a missing one.
        VideoState::Deleted => {
            tx.rollback().await?;
            Err(AppError::Core(CoreError::NotFound {
                entity: "Video",
                id: video.video_id,
            }))
        }
    }
}
