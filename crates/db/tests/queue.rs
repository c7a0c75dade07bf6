mod common;

use scenedex_db::models::queue_task::TASK_MAX_ATTEMPTS;
use scenedex_db::repositories::QueueRepo;
use uuid::Uuid;

/// Claiming an empty queue yields nothing.
#[sqlx::test]
async fn empty_queue_yields_none(pool: sqlx::PgPool) {
    let claimed = QueueRepo::claim_next(&pool, 600.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert!(claimed.is_none());
}

/// Enqueue then claim returns the task with its first attempt counted.
#[sqlx::test]
async fn claim_takes_a_lease(pool: sqlx::PgPool) {
    let video_id = Uuid::new_v4();
    let mut conn = pool.acquire().await.unwrap();
    QueueRepo::enqueue(&mut conn, video_id).await.unwrap();
    drop(conn);

    let task = QueueRepo::claim_next(&pool, 600.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap()
        .expect("task should be claimable");
    assert_eq!(task.video_id, video_id);
    assert_eq!(task.attempts, 1);
    assert_eq!(task.state, "leased");
    assert!(task.leased_until.is_some());
}

/// A live lease hides the task from other claimers.
#[sqlx::test]
async fn live_lease_blocks_reclaim(pool: sqlx::PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    QueueRepo::enqueue(&mut conn, Uuid::new_v4()).await.unwrap();
    drop(conn);

    let first = QueueRepo::claim_next(&pool, 600.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = QueueRepo::claim_next(&pool, 600.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert!(second.is_none());
}

/// An expired lease makes the task deliverable again (at-least-once).
#[sqlx::test]
async fn expired_lease_is_redelivered(pool: sqlx::PgPool) {
    let video_id = Uuid::new_v4();
    let mut conn = pool.acquire().await.unwrap();
    QueueRepo::enqueue(&mut conn, video_id).await.unwrap();
    drop(conn);

    // Zero-length lease: expires immediately.
    let first = QueueRepo::claim_next(&pool, 0.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.attempts, 1);

    let second = QueueRepo::claim_next(&pool, 600.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap()
        .expect("expired lease should redeliver");
    assert_eq!(second.task_id, first.task_id);
    assert_eq!(second.attempts, 2);
}

/// Completed tasks are never redelivered.
#[sqlx::test]
async fn completed_task_is_terminal(pool: sqlx::PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    QueueRepo::enqueue(&mut conn, Uuid::new_v4()).await.unwrap();
    drop(conn);

    let task = QueueRepo::claim_next(&pool, 0.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap()
        .unwrap();
    QueueRepo::complete(&pool, task.task_id).await.unwrap();

    let reclaimed = QueueRepo::claim_next(&pool, 600.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert!(reclaimed.is_none());
}

/// Attempts are capped; exhausted tasks are reaped as dead.
#[sqlx::test]
async fn exhausted_task_is_reaped(pool: sqlx::PgPool) {
    let video_id = Uuid::new_v4();
    let mut conn = pool.acquire().await.unwrap();
    QueueRepo::enqueue(&mut conn, video_id).await.unwrap();
    drop(conn);

    for _ in 0..TASK_MAX_ATTEMPTS {
        let task = QueueRepo::claim_next(&pool, 0.0, TASK_MAX_ATTEMPTS)
            .await
            .unwrap();
        assert!(task.is_some());
    }

    // Cap reached: no further delivery.
    let over = QueueRepo::claim_next(&pool, 600.0, TASK_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert!(over.is_none());

    let dead = QueueRepo::reap_exhausted(&pool, TASK_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert_eq!(dead, vec![video_id]);

    // Reaping is idempotent.
    let again = QueueRepo::reap_exhausted(&pool, TASK_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert!(again.is_empty());
}

/// The per-video advisory lock is exclusive across connections.
#[sqlx::test]
async fn video_lock_is_exclusive(pool: sqlx::PgPool) {
    let video_id = Uuid::new_v4();

    let mut holder = pool.acquire().await.unwrap();
    let mut contender = pool.acquire().await.unwrap();

    assert!(QueueRepo::try_lock_video(&mut holder, video_id)
        .await
        .unwrap());
    assert!(!QueueRepo::try_lock_video(&mut contender, video_id)
        .await
        .unwrap());

    assert!(QueueRepo::unlock_video(&mut holder, video_id)
        .await
        .unwrap());
    assert!(QueueRepo::try_lock_video(&mut contender, video_id)
        .await
        .unwrap());
    QueueRepo::unlock_video(&mut contender, video_id)
        .await
        .unwrap();
}
