//! Video entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use scenedex_core::state::VideoState;
use scenedex_core::types::Timestamp;

/// A row from the `videos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Video {
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    /// Null until validation succeeds; at most 600 once set.
    pub duration_s: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: VideoState,
    /// Set only when `state = failed`.
    pub error_text: Option<String>,
    pub created_at: Timestamp,
    /// Non-null exactly when `state = indexed`.
    pub indexed_at: Option<Timestamp>,
}

/// DTO for inserting a video at upload init.
///
/// `video_id` is allocated by the caller because the storage key embeds it
/// before the row exists.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVideo {
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub title: Option<String>,
    pub description: Option<String>,
}
