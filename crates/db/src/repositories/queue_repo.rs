//! Ingestion task queue over the `queue_tasks` table.
//!
//! At-least-once semantics: a claim takes a lease; a worker that dies
//! simply lets the lease expire and the task is claimable again. Claims
//! use `FOR UPDATE SKIP LOCKED` so concurrent workers never double-claim.
//! Deduplication of redelivered work is the pipeline entry guard's
//! responsibility, not the queue's.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::queue_task::QueueTask;

const COLUMNS: &str = "task_id, video_id, state, attempts, leased_until, enqueued_at";

/// Seed for the per-video advisory lock keyspace, so these locks cannot
/// collide with other advisory-lock users of the same database.
const VIDEO_LOCK_SEED: i64 = 0x5ce7ed;

/// Provides queue operations for ingestion tasks.
pub struct QueueRepo;

impl QueueRepo {
    /// Enqueue an ingestion task. Joins the caller's transaction, so the
    /// task becomes visible exactly when the upload-complete transition
    /// commits.
    pub async fn enqueue(conn: &mut PgConnection, video_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("INSERT INTO queue_tasks (video_id) VALUES ($1) RETURNING task_id")
            .bind(video_id)
            .fetch_one(conn)
            .await
    }

    /// Claim the next deliverable task, taking a lease of `lease_secs`.
    ///
    /// Deliverable means `pending`, or `leased` with an expired lease and
    /// attempts remaining. The claim increments `attempts`, so the value on
    /// the returned row counts this delivery.
    pub async fn claim_next(
        pool: &PgPool,
        lease_secs: f64,
        max_attempts: i32,
    ) -> Result<Option<QueueTask>, sqlx::Error> {
        let query = format!(
            "WITH next AS (
                 SELECT task_id FROM queue_tasks
                 WHERE (state = 'pending'
                        OR (state = 'leased' AND leased_until < now()))
                   AND attempts < $2
                 ORDER BY enqueued_at
                 FOR UPDATE SKIP LOCKED
                 LIMIT 1
             )
             UPDATE queue_tasks t
             SET state = 'leased',
                 attempts = t.attempts + 1,
                 leased_until = now() + make_interval(secs => $1)
             FROM next
             WHERE t.task_id = next.task_id
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueTask>(&query)
            .bind(lease_secs)
            .bind(max_attempts)
            .fetch_optional(pool)
            .await
    }

    /// Mark a task done. Terminal; the task is never redelivered.
    pub async fn complete(pool: &PgPool, task_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_tasks SET state = 'done', leased_until = NULL WHERE task_id = $1",
        )
        .bind(task_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark expired tasks that exhausted their attempts as dead, returning
    /// the affected video ids so the caller can fail them.
    pub async fn reap_exhausted(
        pool: &PgPool,
        max_attempts: i32,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE queue_tasks
             SET state = 'dead', leased_until = NULL
             WHERE state = 'leased' AND leased_until < now() AND attempts >= $1
             RETURNING video_id",
        )
        .bind(max_attempts)
        .fetch_all(pool)
        .await
    }

    /// Try to take the exclusive per-video pipeline lock on this
    /// connection. Non-blocking: `false` means another worker holds it and
    /// the caller should no-op. The lock is session-scoped, so the caller
    /// must hold the connection until [`Self::unlock_video`] (closing the
    /// connection also releases it).
    pub async fn try_lock_video(
        conn: &mut PgConnection,
        video_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT pg_try_advisory_lock(hashtextextended($1::text, $2))")
            .bind(video_id)
            .bind(VIDEO_LOCK_SEED)
            .fetch_one(conn)
            .await
    }

    /// Release the per-video pipeline lock taken by [`Self::try_lock_video`].
    pub async fn unlock_video(
        conn: &mut PgConnection,
        video_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT pg_advisory_unlock(hashtextextended($1::text, $2))")
            .bind(video_id)
            .bind(VIDEO_LOCK_SEED)
            .fetch_one(conn)
            .await
    }
}
