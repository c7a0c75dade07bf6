//! Scene entity model and DTOs.
//!
//! The `text_vec` and `image_vec` columns are pgvector types and are
//! written via SQL casts from text literals; the read model deliberately
//! omits them (the search engine, not this system, reads vectors back).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use scenedex_core::types::Timestamp;

/// A row from the `scenes` table, without the vector columns.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scene {
    pub scene_id: Uuid,
    pub video_id: Uuid,
    pub start_s: f64,
    pub end_s: f64,
    pub transcript: String,
    pub vision_tags: serde_json::Value,
    pub sidecar_key: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a scene in the pipeline's commit transaction.
///
/// `scene_id` is allocated by the pipeline before commit so the sidecar
/// object can be named after it. Non-null vectors must already be
/// L2-normalized and of the schema's dimensionality.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScene {
    pub scene_id: Uuid,
    pub start_s: f64,
    pub end_s: f64,
    pub transcript: String,
    pub text_vec: Option<Vec<f32>>,
    pub image_vec: Option<Vec<f32>>,
    pub vision_tags: serde_json::Value,
    pub sidecar_key: String,
}

/// Format a vector as a pgvector text literal, e.g. `[0.1,0.2,0.3]`.
pub fn vector_literal(v: &[f32]) -> String {
    let mut out = String::with_capacity(v.len() * 12 + 2);
    out.push('[');
    for (i, x) in v.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&x.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_format() {
        assert_eq!(vector_literal(&[]), "[]");
        assert_eq!(vector_literal(&[1.0]), "[1]");
        assert_eq!(vector_literal(&[0.5, -0.25, 2.0]), "[0.5,-0.25,2]");
    }
}
