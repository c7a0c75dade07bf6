//! Repository for the `jobs` table.
//!
//! A partial unique index guarantees at most one pending/running row per
//! `(video_id, stage)`; writers lean on it via `ON CONFLICT` instead of
//! check-then-insert races.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use scenedex_core::state::JobStage;

use crate::models::job::Job;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "job_id, video_id, stage, state, progress, error_text, \
                       started_at, finished_at, created_at";

/// Provides CRUD operations for pipeline jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a pending job for a stage. Returns `None` when an active row
    /// for this `(video, stage)` already exists. Joins the caller's
    /// transaction.
    pub async fn create_pending(
        conn: &mut PgConnection,
        video_id: Uuid,
        stage: JobStage,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (video_id, stage)
             VALUES ($1, $2)
             ON CONFLICT (video_id, stage) WHERE state IN ('pending', 'running')
             DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(video_id)
            .bind(stage)
            .fetch_optional(conn)
            .await
    }

    /// Claim or create the stage's job row and mark it running.
    ///
    /// Reuses an existing pending/running row (queue redelivery re-enters a
    /// stage without violating the uniqueness invariant); `started_at` is
    /// stamped once.
    pub async fn ensure_running(
        pool: &PgPool,
        video_id: Uuid,
        stage: JobStage,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (video_id, stage, state, started_at)
             VALUES ($1, $2, 'running', now())
             ON CONFLICT (video_id, stage) WHERE state IN ('pending', 'running')
             DO UPDATE SET state = 'running',
                           started_at = COALESCE(jobs.started_at, now())
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(video_id)
            .bind(stage)
            .fetch_one(pool)
            .await
    }

    /// Mark a job completed with full progress.
    pub async fn mark_completed(pool: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs
             SET state = 'completed', progress = 100, finished_at = now()
             WHERE job_id = $1",
        )
        .bind(job_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job failed with a short reason.
    pub async fn mark_failed(
        pool: &PgPool,
        job_id: Uuid,
        error_text: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs
             SET state = 'failed', error_text = $2, finished_at = now()
             WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(error_text)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update a running job's progress (clamped to 0..=100).
    pub async fn set_progress(
        pool: &PgPool,
        job_id: Uuid,
        progress: f32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET progress = $2 WHERE job_id = $1")
            .bind(job_id)
            .bind(progress.clamp(0.0, 100.0))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// List a video's jobs in creation (stage-execution) order.
    pub async fn list_by_video(pool: &PgPool, video_id: Uuid) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE video_id = $1 ORDER BY created_at");
        sqlx::query_as::<_, Job>(&query)
            .bind(video_id)
            .fetch_all(pool)
            .await
    }

    /// Complete every still-active job of a video. Runs inside the commit
    /// transaction so the ten completed rows land with the state flip.
    pub async fn complete_active_for_video(
        conn: &mut PgConnection,
        video_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs
             SET state = 'completed', progress = 100, finished_at = now()
             WHERE video_id = $1 AND state IN ('pending', 'running')",
        )
        .bind(video_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
