//! Repository for the `videos` table.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use scenedex_core::state::VideoState;

use crate::models::video::{CreateVideo, Video};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "video_id, user_id, storage_key, mime_type, size_bytes, duration_s, \
                       title, description, state, error_text, created_at, indexed_at";

/// Maximum page size for video listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for video listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations for videos.
pub struct VideoRepo;

impl VideoRepo {
    /// Insert a new video in `uploading` state, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateVideo) -> Result<Video, sqlx::Error> {
        let query = format!(
            "INSERT INTO videos
                 (video_id, user_id, storage_key, mime_type, size_bytes, title, description)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(input.video_id)
            .bind(input.user_id)
            .bind(&input.storage_key)
            .bind(&input.mime_type)
            .bind(input.size_bytes)
            .bind(&input.title)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// Find a video by ID, regardless of owner. Worker-side lookup.
    pub async fn find_by_id(pool: &PgPool, video_id: Uuid) -> Result<Option<Video>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE video_id = $1");
        sqlx::query_as::<_, Video>(&query)
            .bind(video_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a video scoped to its owner. API-side lookup; a foreign video
    /// is indistinguishable from a missing one.
    pub async fn find_owned(
        pool: &PgPool,
        video_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Video>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE video_id = $1 AND user_id = $2");
        sqlx::query_as::<_, Video>(&query)
            .bind(video_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Owner-scoped lookup with a row lock, serializing concurrent
    /// `complete_upload` calls on the same video.
    pub async fn find_owned_for_update(
        conn: &mut PgConnection,
        video_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Video>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM videos WHERE video_id = $1 AND user_id = $2 FOR UPDATE"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(video_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await
    }

    /// List a user's videos, newest first (ties broken by `video_id` for a
    /// deterministic order). `limit` defaults to 50, capped at 100.
    pub async fn list_by_owner(
        pool: &PgPool,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Video>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM videos
             WHERE user_id = $1
             ORDER BY created_at DESC, video_id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count a user's videos.
    pub async fn count_by_owner(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT count(*) FROM videos WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Set the video state. Joins the caller's transaction.
    pub async fn set_state(
        conn: &mut PgConnection,
        video_id: Uuid,
        state: VideoState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE videos SET state = $2 WHERE video_id = $1")
            .bind(video_id)
            .bind(state)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Record the probed duration after validation succeeds.
    pub async fn set_duration(
        pool: &PgPool,
        video_id: Uuid,
        duration_s: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE videos SET duration_s = $2 WHERE video_id = $1")
            .bind(video_id)
            .bind(duration_s)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Move a video to `failed` with a short human-readable reason.
    pub async fn mark_failed(
        pool: &PgPool,
        video_id: Uuid,
        error_text: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE videos SET state = 'failed', error_text = $2 WHERE video_id = $1")
            .bind(video_id)
            .bind(error_text)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Fail a video only if its pipeline never finished. Used when a queue
    /// task exhausts its deliveries: a video that already reached a
    /// terminal state is left untouched.
    pub async fn mark_failed_if_unfinished(
        pool: &PgPool,
        video_id: Uuid,
        error_text: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE videos
             SET state = 'failed', error_text = $2
             WHERE video_id = $1
               AND state IN ('validating', 'processing')
               AND indexed_at IS NULL",
        )
        .bind(video_id)
        .bind(error_text)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a video to `indexed`, stamping `indexed_at`. Joins the commit
    /// transaction so scenes, jobs, and the state flip land atomically.
    pub async fn mark_indexed(conn: &mut PgConnection, video_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE videos SET state = 'indexed', indexed_at = now() WHERE video_id = $1")
            .bind(video_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
