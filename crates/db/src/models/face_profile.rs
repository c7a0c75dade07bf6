//! Face profile entity model (enrollment only; recognition is future work).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use scenedex_core::types::Timestamp;

/// A row from the `face_profiles` table, without the vector column.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FaceProfile {
    pub face_profile_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub photo_key: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for enrolling a face profile.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFaceProfile {
    pub name: String,
    pub photo_key: Option<String>,
    /// 512-dimensional, L2-normalized. Cast to pgvector in SQL.
    pub face_vec: Option<Vec<f32>>,
}
