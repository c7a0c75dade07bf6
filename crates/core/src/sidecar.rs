//! Per-scene sidecar JSON.
//!
//! A sidecar is a durable, immutable artifact stored next to the video in
//! the `sidecars` bucket. Key order is fixed (struct declaration order) so
//! diffs between producer versions stay stable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Sidecar document for one scene.
///
/// `vision_tags` is a reserved tag bag for zero-shot labels; it may be
/// empty in this version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSidecar {
    pub scene_id: Uuid,
    pub video_id: Uuid,
    pub start_s: f64,
    pub end_s: f64,
    pub transcript: String,
    pub vision_tags: Map<String, Value>,
}

impl SceneSidecar {
    /// Serialize to pretty-printed JSON bytes with the fixed key order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
