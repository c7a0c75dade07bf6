mod common;

use axum::http::StatusCode;
use uuid::Uuid;

/// Upload init requires a verified identity.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn init_requires_auth(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool);
    let response = common::post_json_unauthenticated(
        app,
        "/api/v1/videos/upload/init",
        common::init_body(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Unsupported MIME types are rejected and no row is created.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn init_rejects_bad_mime(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool.clone());
    let mut body = common::init_body();
    body["mime_type"] = "image/gif".into();

    let response = common::post_json(app, "/api/v1/videos/upload/init", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["code"], "INVALID_INPUT");

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM videos")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

/// One byte over the 1 GiB cap is rejected.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn init_rejects_oversize(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool.clone());
    let mut body = common::init_body();
    body["size_bytes"] = 1_073_741_825_i64.into();

    let response = common::post_json(app, "/api/v1/videos/upload/init", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["code"], "INVALID_INPUT");

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM videos")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

/// Exactly 1 GiB is accepted.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn init_accepts_exactly_one_gib(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool);
    let mut body = common::init_body();
    body["size_bytes"] = 1_073_741_824_i64.into();

    let response = common::post_json(app, "/api/v1/videos/upload/init", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// The happy path creates an `uploading` row and a presigned URL whose key
/// embeds the video id and sanitized filename.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn init_creates_uploading_video(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool.clone());

    let response = common::post_json(app, "/api/v1/videos/upload/init", common::init_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = common::body_json(response).await;

    let video_id: Uuid = json["video_id"].as_str().unwrap().parse().unwrap();
    let upload_url = json["upload_url"].as_str().unwrap();
    assert!(upload_url.contains(&video_id.to_string()));
    assert!(upload_url.contains("clip.mp4"));
    assert!(json["expires_at"].is_string());

    let state: String = sqlx::query_scalar("SELECT state FROM videos WHERE video_id = $1")
        .bind(video_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(state, "uploading");
}

/// init is intentionally non-idempotent: every call is a fresh video.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn init_allocates_fresh_ids(pool: sqlx::PgPool) {
    let first = common::post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/videos/upload/init",
        common::init_body(),
    )
    .await;
    let second = common::post_json(
        common::build_test_app(pool),
        "/api/v1/videos/upload/init",
        common::init_body(),
    )
    .await;

    let a = common::body_json(first).await;
    let b = common::body_json(second).await;
    assert_ne!(a["video_id"], b["video_id"]);
}

/// Completing an unknown video is a uniform 404.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn complete_unknown_video_is_404(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool);
    let response = common::post_json(
        app,
        "/api/v1/videos/upload/complete",
        serde_json::json!({ "video_id": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = common::body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

/// Completing someone else's video is the same uniform 404.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn complete_foreign_video_is_404(pool: sqlx::PgPool) {
    let init = common::post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/videos/upload/init",
        common::init_body(),
    )
    .await;
    let video_id = common::body_json(init).await["video_id"].clone();

    let response = common::send_json_as(
        common::build_test_app(pool),
        axum::http::Method::POST,
        "/api/v1/videos/upload/complete",
        "ext-other-user",
        "other@example.com",
        serde_json::json!({ "video_id": video_id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Repeated completion of a video already handed to the pipeline returns
/// the current state and never enqueues a second task.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn complete_is_idempotent_after_handoff(pool: sqlx::PgPool) {
    let init = common::post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/videos/upload/init",
        common::init_body(),
    )
    .await;
    let video_id: Uuid = common::body_json(init).await["video_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    // Simulate the first successful completion having already happened.
    sqlx::query("UPDATE videos SET state = 'validating' WHERE video_id = $1")
        .bind(video_id)
        .execute(&pool)
        .await
        .unwrap();

    for _ in 0..2 {
        let response = common::post_json(
            common::build_test_app(pool.clone()),
            "/api/v1/videos/upload/complete",
            serde_json::json!({ "video_id": video_id }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = common::body_json(response).await;
        assert_eq!(json["state"], "validating");
    }

    let tasks: i64 = sqlx::query_scalar("SELECT count(*) FROM queue_tasks WHERE video_id = $1")
        .bind(video_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tasks, 0, "idempotent completes must not enqueue");
}

/// A terminal `failed` video reports `failed` on complete.
#[sqlx::test(migrator = "scenedex_db::MIGRATOR")]
async fn complete_reports_terminal_state(pool: sqlx::PgPool) {
    let init = common::post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/videos/upload/init",
        common::init_body(),
    )
    .await;
    let video_id: Uuid = common::body_json(init).await["video_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    sqlx::query("UPDATE videos SET state = 'failed', error_text = 'INVALID_MEDIA' WHERE video_id = $1")
        .bind(video_id)
        .execute(&pool)
        .await
        .unwrap();

    let response = common::post_json(
        common::build_test_app(pool),
        "/api/v1/videos/upload/complete",
        serde_json::json!({ "video_id": video_id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert_eq!(json["state"], "failed");
}
