mod common;

use scenedex_core::state::VideoState;
use scenedex_db::repositories::VideoRepo;

/// A freshly created video starts in `uploading` with no duration.
#[sqlx::test]
async fn create_starts_uploading(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let video = common::create_video(&pool, user_id).await;

    assert_eq!(video.state, VideoState::Uploading);
    assert!(video.duration_s.is_none());
    assert!(video.indexed_at.is_none());
    assert!(video.error_text.is_none());
}

/// Owner scoping: a foreign video is indistinguishable from a missing one.
#[sqlx::test]
async fn find_owned_hides_foreign_videos(pool: sqlx::PgPool) {
    let owner = common::create_user(&pool).await;
    let stranger = common::create_user(&pool).await;
    let video = common::create_video(&pool, owner).await;

    let found = VideoRepo::find_owned(&pool, video.video_id, owner)
        .await
        .unwrap();
    assert!(found.is_some());

    let hidden = VideoRepo::find_owned(&pool, video.video_id, stranger)
        .await
        .unwrap();
    assert!(hidden.is_none());
}

/// Listing orders newest first and respects the limit.
#[sqlx::test]
async fn list_orders_newest_first(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(common::create_video(&pool, user_id).await.video_id);
    }

    let listed = VideoRepo::list_by_owner(&pool, user_id, None, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);
    for window in listed.windows(2) {
        assert!(
            (window[0].created_at, window[0].video_id) >= (window[1].created_at, window[1].video_id)
        );
    }

    let limited = VideoRepo::list_by_owner(&pool, user_id, Some(2), None)
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    assert_eq!(VideoRepo::count_by_owner(&pool, user_id).await.unwrap(), 3);
}

/// `mark_failed` records the reason; `mark_indexed` stamps `indexed_at`
/// (the schema enforces `state = indexed ⇔ indexed_at IS NOT NULL`).
#[sqlx::test]
async fn terminal_transitions_persist(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let failing = common::create_video(&pool, user_id).await;
    let indexing = common::create_video(&pool, user_id).await;

    VideoRepo::mark_failed(&pool, failing.video_id, "DURATION_EXCEEDED")
        .await
        .unwrap();
    let failed = VideoRepo::find_by_id(&pool, failing.video_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.state, VideoState::Failed);
    assert_eq!(failed.error_text.as_deref(), Some("DURATION_EXCEEDED"));

    let mut conn = pool.acquire().await.unwrap();
    VideoRepo::mark_indexed(&mut conn, indexing.video_id)
        .await
        .unwrap();
    drop(conn);

    let indexed = VideoRepo::find_by_id(&pool, indexing.video_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(indexed.state, VideoState::Indexed);
    assert!(indexed.indexed_at.is_some());
}

/// The schema rejects an `indexed` state without a timestamp.
#[sqlx::test]
async fn indexed_without_timestamp_is_rejected(pool: sqlx::PgPool) {
    let user_id = common::create_user(&pool).await;
    let video = common::create_video(&pool, user_id).await;

    let result = sqlx::query("UPDATE videos SET state = 'indexed' WHERE video_id = $1")
        .bind(video.video_id)
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
