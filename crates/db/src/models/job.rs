//! Job entity model for per-stage pipeline progress tracking.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use scenedex_core::state::{JobStage, JobState};
use scenedex_core::types::Timestamp;

/// A row from the `jobs` table.
///
/// At most one row per `(video_id, stage)` may be pending or running,
/// enforced by a partial unique index.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub job_id: Uuid,
    #[serde(skip)]
    pub video_id: Uuid,
    pub stage: JobStage,
    pub state: JobState,
    /// 0..=100.
    pub progress: f32,
    pub error_text: Option<String>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    #[serde(skip)]
    pub created_at: Timestamp,
}
