//! Repository for the `face_profiles` table.
//!
//! Enrollment storage only; the indexing pipeline does not read faces.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::face_profile::{CreateFaceProfile, FaceProfile};
use crate::models::scene::vector_literal;

/// Column list for reads (vector column intentionally absent).
const COLUMNS: &str = "face_profile_id, user_id, name, photo_key, created_at";

/// Provides CRUD operations for face profiles.
pub struct FaceProfileRepo;

impl FaceProfileRepo {
    /// Enroll a face profile for a user.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        input: &CreateFaceProfile,
    ) -> Result<FaceProfile, sqlx::Error> {
        let query = format!(
            "INSERT INTO face_profiles (user_id, name, photo_key, face_vec)
             VALUES ($1, $2, $3, $4::vector)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FaceProfile>(&query)
            .bind(user_id)
            .bind(&input.name)
            .bind(&input.photo_key)
            .bind(input.face_vec.as_deref().map(vector_literal))
            .fetch_one(pool)
            .await
    }

    /// List a user's enrolled profiles.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<FaceProfile>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM face_profiles WHERE user_id = $1 ORDER BY created_at"
        );
        sqlx::query_as::<_, FaceProfile>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
