//! Inference handlers.
//!
//! Each endpoint takes one semaphore permit for its whole execution; when
//! none is available the request is refused with 503 and the caller backs
//! off. Model execution happens on blocking threads so the async runtime
//! keeps serving health checks while the GPU/CPU crunches.

use axum::extract::State;
use axum::Json;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use tokio::sync::OwnedSemaphorePermit;

use scenedex_core::vector::{FACE_EMBEDDING_DIM, TEXT_EMBEDDING_DIM, VISION_EMBEDDING_DIM};
use scenedex_model_client::protocol::{
    DetectFacesRequest, DetectFacesResponse, EmbedImageRequest, EmbedImageResponse,
    EmbedTextRequest, EmbedTextResponse, HealthResponse, TranscribeRequest, TranscribeResponse,
};

use crate::audio::decode_wav_to_mono_16k;
use crate::error::ServiceError;
use crate::state::AppState;

/// Take an inference slot or refuse with 503.
fn take_permit(state: &AppState) -> Result<OwnedSemaphorePermit, ServiceError> {
    state
        .permits
        .clone()
        .try_acquire_owned()
        .map_err(|_| ServiceError::Saturated)
}

/// Decode a base64 payload or reject the request.
fn decode_base64(data: &str, what: &str) -> Result<Vec<u8>, ServiceError> {
    BASE64_STANDARD
        .decode(data)
        .map_err(|e| ServiceError::BadRequest(format!("invalid base64 {what}: {e}")))
}

/// Decode image bytes or reject the request.
fn decode_image(bytes: &[u8]) -> Result<image::DynamicImage, ServiceError> {
    image::load_from_memory(bytes)
        .map_err(|e| ServiceError::BadRequest(format!("undecodable image: {e}")))
}

/// POST /asr/transcribe
pub async fn transcribe(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, ServiceError> {
    let _permit = take_permit(&state)?;
    let audio = decode_base64(&request.audio_base64, "audio")?;

    let models = state.models.clone();
    let language = request.language.clone();
    let (segments, language) = tokio::task::spawn_blocking(move || {
        let samples = decode_wav_to_mono_16k(&audio)
            .map_err(|e| ServiceError::BadRequest(format!("undecodable audio: {e}")))?;
        let mut asr = models.asr.lock().expect("ASR mutex poisoned");
        asr.transcribe(&samples, language.as_deref())
            .map_err(|e| ServiceError::Inference(e.to_string()))
    })
    .await
    .map_err(|e| ServiceError::Inference(format!("task join: {e}")))??;

    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Json(TranscribeResponse {
        text,
        segments,
        language,
    }))
}

/// POST /embed/text
pub async fn embed_text(
    State(state): State<AppState>,
    Json(request): Json<EmbedTextRequest>,
) -> Result<Json<EmbedTextResponse>, ServiceError> {
    if request.texts.is_empty() {
        return Err(ServiceError::BadRequest("texts must not be empty".into()));
    }
    if request.texts.iter().any(|t| t.is_empty()) {
        return Err(ServiceError::BadRequest(
            "texts must not contain empty strings".into(),
        ));
    }
    let _permit = take_permit(&state)?;

    let models = state.models.clone();
    let texts = request.texts;
    let embeddings = tokio::task::spawn_blocking(move || {
        let embedder = models.text.lock().expect("text mutex poisoned");
        embedder
            .embed_batch(&texts)
            .map_err(|e| ServiceError::Inference(e.to_string()))
    })
    .await
    .map_err(|e| ServiceError::Inference(format!("task join: {e}")))??;

    Ok(Json(EmbedTextResponse {
        embeddings,
        dimension: TEXT_EMBEDDING_DIM,
    }))
}

/// POST /embed/image
pub async fn embed_image(
    State(state): State<AppState>,
    Json(request): Json<EmbedImageRequest>,
) -> Result<Json<EmbedImageResponse>, ServiceError> {
    if request.images_base64.is_empty() {
        return Err(ServiceError::BadRequest("images must not be empty".into()));
    }
    let _permit = take_permit(&state)?;

    let mut images = Vec::with_capacity(request.images_base64.len());
    for encoded in &request.images_base64 {
        let bytes = decode_base64(encoded, "image")?;
        images.push(decode_image(&bytes)?);
    }

    let models = state.models.clone();
    let embeddings = tokio::task::spawn_blocking(move || {
        let embedder = models.vision.lock().expect("vision mutex poisoned");
        embedder
            .embed_batch(&images)
            .map_err(|e| ServiceError::Inference(e.to_string()))
    })
    .await
    .map_err(|e| ServiceError::Inference(format!("task join: {e}")))??;

    Ok(Json(EmbedImageResponse {
        embeddings,
        dimension: VISION_EMBEDDING_DIM,
    }))
}

/// POST /face/detect
pub async fn detect_faces(
    State(state): State<AppState>,
    Json(request): Json<DetectFacesRequest>,
) -> Result<Json<DetectFacesResponse>, ServiceError> {
    let _permit = take_permit(&state)?;
    let bytes = decode_base64(&request.image_base64, "image")?;
    let image = decode_image(&bytes)?;

    let models = state.models.clone();
    let faces = tokio::task::spawn_blocking(move || {
        let mut detector = models.face.lock().expect("face mutex poisoned");
        detector
            .detect(&image)
            .map_err(|e| ServiceError::Inference(e.to_string()))
    })
    .await
    .map_err(|e| ServiceError::Inference(format!("task join: {e}")))??;

    Ok(Json(DetectFacesResponse { faces }))
}

/// GET /health
///
/// Never takes a permit: health stays observable under full load.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        loaded_models: state.models.loaded_models(),
        device: state.models.device_label.clone(),
        memory_used_bytes: state.models.memory_used_bytes,
        text_dimension: TEXT_EMBEDDING_DIM,
        vision_dimension: VISION_EMBEDDING_DIM,
        face_dimension: FACE_EMBEDDING_DIM,
        uptime_s: state.started_at.elapsed().as_secs(),
    })
}
