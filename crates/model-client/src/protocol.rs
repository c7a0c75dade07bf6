//! Wire protocol for the model inference service.
//!
//! Binary payloads (audio, images) travel base64-encoded inside JSON
//! bodies. Batch endpoints preserve input order in their outputs.

use serde::{Deserialize, Serialize};

use scenedex_core::scenes::TranscriptSegment;

/// Error body returned by the service: `{ "error": ..., "code": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

// ---------------------------------------------------------------------------
// /asr/transcribe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Base64-encoded WAV file (16-bit PCM or 32-bit float), as produced
    /// by the pipeline's audio-extract stage.
    pub audio_base64: String,
    /// Optional ISO-639-1 language hint (e.g. `"en"`, `"ko"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeResponse {
    /// Full transcript, segment texts joined.
    pub text: String,
    /// Segments with monotonically non-decreasing starts.
    pub segments: Vec<TranscriptSegment>,
    /// Language actually used for decoding.
    pub language: String,
}

// ---------------------------------------------------------------------------
// /embed/text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedTextRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedTextResponse {
    /// One L2-normalized vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    pub dimension: usize,
}

// ---------------------------------------------------------------------------
// /embed/image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedImageRequest {
    /// Base64-encoded images (JPEG/PNG).
    pub images_base64: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedImageResponse {
    /// One L2-normalized vector per input image, in input order.
    pub embeddings: Vec<Vec<f32>>,
    pub dimension: usize,
}

// ---------------------------------------------------------------------------
// /face/detect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectFacesRequest {
    pub image_base64: String,
}

/// One detected face: pixel-space bounding box plus confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    /// `[x, y, width, height]` in pixels.
    pub bbox: [f32; 4],
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectFacesResponse {
    pub faces: Vec<FaceDetection>,
}

// ---------------------------------------------------------------------------
// /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub loaded_models: Vec<String>,
    pub device: String,
    pub memory_used_bytes: u64,
    /// Must equal the `scenes.text_vec` column width.
    pub text_dimension: usize,
    /// Must equal the `scenes.image_vec` column width.
    pub vision_dimension: usize,
    pub face_dimension: usize,
    pub uptime_s: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcribe_request_omits_missing_language() {
        let req = TranscribeRequest {
            audio_base64: "AAAA".to_string(),
            language: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("language"));

        let hinted = TranscribeRequest {
            audio_base64: "AAAA".to_string(),
            language: Some("ko".to_string()),
        };
        let json = serde_json::to_string(&hinted).unwrap();
        assert!(json.contains("\"language\":\"ko\""));
    }

    #[test]
    fn segments_round_trip() {
        let response = TranscribeResponse {
            text: "hello world".to_string(),
            segments: vec![scenedex_core::scenes::TranscriptSegment {
                start_s: 0.0,
                end_s: 2.5,
                text: "hello world".to_string(),
            }],
            language: "en".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        let parsed: TranscribeResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        assert!((parsed.segments[0].end_s - 2.5).abs() < 1e-9);
    }
}
