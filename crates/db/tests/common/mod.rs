#![allow(dead_code)]

use sqlx::PgPool;
use uuid::Uuid;

use scenedex_db::models::user::CreateUser;
use scenedex_db::models::video::{CreateVideo, Video};
use scenedex_db::repositories::{UserRepo, VideoRepo};

/// Insert a user with a unique email/external id.
pub async fn create_user(pool: &PgPool) -> Uuid {
    let tag = Uuid::new_v4();
    let user = UserRepo::create(
        pool,
        &CreateUser {
            external_auth_id: format!("ext-{tag}"),
            email: format!("user-{tag}@example.com"),
            email_verified: true,
        },
    )
    .await
    .expect("create user");
    user.user_id
}

/// Insert a video in `uploading` state for the given user.
pub async fn create_video(pool: &PgPool, user_id: Uuid) -> Video {
    let video_id = Uuid::new_v4();
    VideoRepo::create(
        pool,
        &CreateVideo {
            video_id,
            user_id,
            storage_key: format!("{user_id}/{video_id}/clip.mp4"),
            mime_type: "video/mp4".to_string(),
            size_bytes: 52_428_800,
            title: Some("clip".to_string()),
            description: None,
        },
    )
    .await
    .expect("create video")
}
