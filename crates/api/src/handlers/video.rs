//! Read handlers for the `/videos` resource: list, detail, and status.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scenedex_core::error::CoreError;
use scenedex_core::state::VideoState;
use scenedex_db::models::job::Job;
use scenedex_db::models::video::Video;
use scenedex_db::repositories::{JobRepo, VideoRepo};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<Video>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct VideoStatusResponse {
    pub video_id: Uuid,
    pub state: VideoState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    pub jobs: Vec<Job>,
}

/// GET /api/v1/videos
///
/// The caller's videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<VideoListResponse>> {
    let videos =
        VideoRepo::list_by_owner(&state.pool, user.user_id, params.limit, params.offset).await?;
    let total = VideoRepo::count_by_owner(&state.pool, user.user_id).await?;
    Ok(Json(VideoListResponse { videos, total }))
}

/// GET /api/v1/videos/{video_id}
pub async fn get_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
) -> AppResult<Json<Video>> {
    let video = VideoRepo::find_owned(&state.pool, video_id, user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Video",
            id: video_id,
        }))?;
    Ok(Json(video))
}

/// GET /api/v1/videos/{video_id}/status
///
/// Read-only snapshot of the video state and its pipeline jobs.
pub async fn get_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
) -> AppResult<Json<VideoStatusResponse>> {
    let video = VideoRepo::find_owned(&state.pool, video_id, user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Video",
            id: video_id,
        }))?;

    let jobs = JobRepo::list_by_video(&state.pool, video_id).await?;

    Ok(Json(VideoStatusResponse {
        video_id: video.video_id,
        state: video.state,
        error_text: video.error_text,
        jobs,
    }))
}
