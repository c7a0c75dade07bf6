//! Route definitions for video upload and status.
//!
//! Mounted at `/videos`.
//!
//! ```text
//! POST /upload/init          upload::init_upload
//! POST /upload/complete      upload::complete_upload
//! GET  /                     video::list_videos
//! GET  /{video_id}           video::get_video
//! GET  /{video_id}/status    video::get_status
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{upload, video};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload/init", post(upload::init_upload))
        .route("/upload/complete", post(upload::complete_upload))
        .route("/", get(video::list_videos))
        .route("/{video_id}", get(video::get_video))
        .route("/{video_id}/status", get(video::get_status))
}
