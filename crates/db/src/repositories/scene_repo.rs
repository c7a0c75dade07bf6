//! Repository for the `scenes` table.
//!
//! Inserts happen only inside the pipeline's commit transaction, so every
//! write method takes `&mut PgConnection`. Embedding vectors arrive as
//! `Vec<f32>` and are cast to pgvector via text literals; the `tsv`
//! full-text column is computed in SQL from the transcript.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::scene::{vector_literal, NewScene, Scene};

/// Column list for reads (vector columns are intentionally absent).
const COLUMNS: &str =
    "scene_id, video_id, start_s, end_s, transcript, vision_tags, sidecar_key, created_at";

/// Provides persistence for scenes.
pub struct SceneRepo;

impl SceneRepo {
    /// Insert one scene row. Joins the caller's transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        video_id: Uuid,
        scene: &NewScene,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO scenes
                 (scene_id, video_id, start_s, end_s, transcript, tsv,
                  text_vec, image_vec, vision_tags, sidecar_key)
             VALUES ($1, $2, $3, $4, $5, to_tsvector('simple', $5),
                     $6::vector, $7::vector, $8, $9)",
        )
        .bind(scene.scene_id)
        .bind(video_id)
        .bind(scene.start_s)
        .bind(scene.end_s)
        .bind(&scene.transcript)
        .bind(scene.text_vec.as_deref().map(vector_literal))
        .bind(scene.image_vec.as_deref().map(vector_literal))
        .bind(&scene.vision_tags)
        .bind(&scene.sidecar_key)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Insert all scenes of a video, in timeline order.
    pub async fn insert_all(
        conn: &mut PgConnection,
        video_id: Uuid,
        scenes: &[NewScene],
    ) -> Result<(), sqlx::Error> {
        for scene in scenes {
            Self::insert(conn, video_id, scene).await?;
        }
        Ok(())
    }

    /// List a video's scenes ordered by start time.
    pub async fn list_by_video(pool: &PgPool, video_id: Uuid) -> Result<Vec<Scene>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenes WHERE video_id = $1 ORDER BY start_s");
        sqlx::query_as::<_, Scene>(&query)
            .bind(video_id)
            .fetch_all(pool)
            .await
    }

    /// Count a video's scenes.
    pub async fn count_by_video(pool: &PgPool, video_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT count(*) FROM scenes WHERE video_id = $1")
            .bind(video_id)
            .fetch_one(pool)
            .await
    }
}
