mod common;

use scenedex_core::state::{JobStage, JobState};
use scenedex_db::repositories::JobRepo;

/// Only one pending/running job may exist per (video, stage).
#[sqlx::test]
async fn duplicate_active_job_is_not_created(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let video = common::create_video(&pool, user_id).await;

    let mut conn = pool.acquire().await.unwrap();
    let first = JobRepo::create_pending(&mut conn, video.video_id, JobStage::UploadValidate)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = JobRepo::create_pending(&mut conn, video.video_id, JobStage::UploadValidate)
        .await
        .unwrap();
    assert!(second.is_none());
}

/// `ensure_running` reuses the pending row instead of inserting another.
#[sqlx::test]
async fn ensure_running_claims_pending_row(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let video = common::create_video(&pool, user_id).await;

    let mut conn = pool.acquire().await.unwrap();
    let pending = JobRepo::create_pending(&mut conn, video.video_id, JobStage::UploadValidate)
        .await
        .unwrap()
        .unwrap();
    drop(conn);

    let running = JobRepo::ensure_running(&pool, video.video_id, JobStage::UploadValidate)
        .await
        .unwrap();
    assert_eq!(running.job_id, pending.job_id);
    assert_eq!(running.state, JobState::Running);
    assert!(running.started_at.is_some());

    let jobs = JobRepo::list_by_video(&pool, video.video_id).await.unwrap();
    assert_eq!(jobs.len(), 1);
}

/// A completed stage frees the slot for a new job row.
#[sqlx::test]
async fn completed_stage_frees_the_slot(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let video = common::create_video(&pool, user_id).await;

    let job = JobRepo::ensure_running(&pool, video.video_id, JobStage::Asr)
        .await
        .unwrap();
    JobRepo::mark_completed(&pool, job.job_id).await.unwrap();

    let next = JobRepo::ensure_running(&pool, video.video_id, JobStage::Asr)
        .await
        .unwrap();
    assert_ne!(next.job_id, job.job_id);
}

/// `complete_active_for_video` closes every open stage at commit.
#[sqlx::test]
async fn commit_completes_all_active_jobs(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let video = common::create_video(&pool, user_id).await;

    for stage in JobStage::ALL {
        JobRepo::ensure_running(&pool, video.video_id, stage)
            .await
            .unwrap();
    }

    let mut conn = pool.acquire().await.unwrap();
    let closed = JobRepo::complete_active_for_video(&mut conn, video.video_id)
        .await
        .unwrap();
    drop(conn);
    assert_eq!(closed, 10);

    let jobs = JobRepo::list_by_video(&pool, video.video_id).await.unwrap();
    assert_eq!(jobs.len(), 10);
    assert!(jobs.iter().all(|j| j.state == JobState::Completed));
    assert!(jobs.iter().all(|j| (j.progress - 100.0).abs() < f32::EPSILON));
}

/// A failed job records its reason and finish time.
#[sqlx::test]
async fn failed_job_records_reason(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let video = common::create_video(&pool, user_id).await;

    let job = JobRepo::ensure_running(&pool, video.video_id, JobStage::UploadValidate)
        .await
        .unwrap();
    JobRepo::mark_failed(&pool, job.job_id, "INVALID_MEDIA")
        .await
        .unwrap();

    let jobs = JobRepo::list_by_video(&pool, video.video_id).await.unwrap();
    assert_eq!(jobs[0].state, JobState::Failed);
    assert_eq!(jobs[0].error_text.as_deref(), Some("INVALID_MEDIA"));
    assert!(jobs[0].finished_at.is_some());
}
