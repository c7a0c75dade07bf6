//! Stage bodies for the indexing pipeline.
//!
//! Each function does one stage's work and classifies its own failures;
//! job-row bookkeeping lives in the caller. Stages 5–9 operate on
//! [`SceneDraft`]s; nothing touches the scenes table until [`commit`].

use std::path::{Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;

use scenedex_core::ffmpeg::{self, FfmpegError};
use scenedex_core::scenes::{
    intervals_from_cuts, merge_short_scenes, scene_transcript, SceneInterval, TranscriptSegment,
    MIN_SCENE_LEN_SECS,
};
use scenedex_core::sidecar::SceneSidecar;
use scenedex_core::upload::{sidecar_object_key, MAX_VIDEO_DURATION_SECS};
use scenedex_core::vector::{l2_normalize, TEXT_EMBEDDING_DIM, VISION_EMBEDDING_DIM};
use scenedex_db::models::job::Job;
use scenedex_db::models::scene::NewScene;
use scenedex_db::models::video::Video;
use scenedex_db::repositories::{JobRepo, SceneRepo, VideoRepo};

use super::error::StageError;
use super::Pipeline;

/// The downloaded source object plus what validation learned about it.
pub(crate) struct MediaFile {
    pub path: PathBuf,
    pub duration_s: f64,
    pub has_audio: bool,
}

/// Accumulated per-scene state flowing through stages 5–10.
pub(crate) struct SceneDraft {
    pub scene_id: Uuid,
    pub start_s: f64,
    pub end_s: f64,
    pub transcript: String,
    pub text_vec: Option<Vec<f32>>,
    pub frame_jpeg: Option<Vec<u8>>,
    pub image_vec: Option<Vec<f32>>,
    pub sidecar_key: Option<String>,
}

/// Classify an ffmpeg error: a missing binary is an operational problem
/// worth retrying elsewhere; anything else means the media is bad.
fn media_error(e: FfmpegError, fatal_reason: &str) -> StageError {
    match e {
        FfmpegError::NotFound(io) => StageError::transient(format!("ffmpeg missing: {io}")),
        other => StageError::fatal(fatal_reason, other),
    }
}

// ---------------------------------------------------------------------------
// Stage 1: validate
// ---------------------------------------------------------------------------

/// Download the uploaded object and probe it. Rejects undecodable media
/// (`INVALID_MEDIA`) and over-long videos (`DURATION_EXCEEDED`); persists
/// the probed duration on success.
pub(crate) async fn validate(
    p: &Pipeline,
    video: &Video,
    scratch: &Path,
) -> Result<MediaFile, StageError> {
    let path = scratch.join("source");
    let bucket = &p.storage().config().bucket_uploads;
    let bytes = p
        .storage()
        .download_to_file(bucket, &video.storage_key, &path)
        .await?;
    tracing::debug!(video_id = %video.video_id, bytes, "Fetched source object");

    let probe = match ffmpeg::probe_media(&path).await {
        Ok(probe) => probe,
        Err(e) => return Err(media_error(e, "INVALID_MEDIA")),
    };

    if !ffmpeg::has_video_stream(&probe) {
        return Err(StageError::fatal("INVALID_MEDIA", "no video stream"));
    }

    let duration_s = ffmpeg::parse_duration(&probe)
        .filter(|d| *d > 0.0)
        .ok_or_else(|| StageError::fatal("INVALID_MEDIA", "no parseable duration"))?;

    if duration_s > MAX_VIDEO_DURATION_SECS {
        return Err(StageError::fatal(
            "DURATION_EXCEEDED",
            format!("{duration_s:.3}s > {MAX_VIDEO_DURATION_SECS}s"),
        ));
    }

    VideoRepo::set_duration(p.pool(), video.video_id, duration_s).await?;

    Ok(MediaFile {
        path,
        duration_s,
        has_audio: ffmpeg::has_audio_stream(&probe),
    })
}

// ---------------------------------------------------------------------------
// Stage 2: audio extract
// ---------------------------------------------------------------------------

/// Transcode the audio track to mono 16 kHz PCM WAV in local scratch.
/// A video without an audio stream yields `None` and the ASR stage
/// produces an empty transcript.
pub(crate) async fn extract_audio(
    media: &MediaFile,
    scratch: &Path,
) -> Result<Option<PathBuf>, StageError> {
    if !media.has_audio {
        return Ok(None);
    }
    let audio_path = scratch.join("audio.wav");
    ffmpeg::extract_audio_wav(&media.path, &audio_path)
        .await
        .map_err(|e| media_error(e, "AUDIO_EXTRACT_FAILED"))?;
    Ok(Some(audio_path))
}

// ---------------------------------------------------------------------------
// Stage 3: ASR
// ---------------------------------------------------------------------------

/// Transcribe the extracted audio via the model service. Segments are
/// sorted so downstream alignment can rely on time order.
pub(crate) async fn transcribe(
    p: &Pipeline,
    audio_path: Option<&Path>,
) -> Result<Vec<TranscriptSegment>, StageError> {
    let Some(audio_path) = audio_path else {
        return Ok(Vec::new());
    };

    let audio = tokio::fs::read(audio_path)
        .await
        .map_err(|e| StageError::transient(format!("read audio: {e}")))?;

    let response = p
        .models()
        .transcribe(&audio, p.config().asr_language.as_deref())
        .await?;

    let mut segments = response.segments;
    segments.retain(|s| s.end_s >= s.start_s);
    segments.sort_by(|a, b| a.start_s.total_cmp(&b.start_s));
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Stage 4: scene detect
// ---------------------------------------------------------------------------

/// Detect content cuts and build the scene timeline covering the whole
/// duration; sub-second scenes merge into their successor.
pub(crate) async fn detect_scenes(
    p: &Pipeline,
    media: &MediaFile,
) -> Result<Vec<SceneInterval>, StageError> {
    let cuts = ffmpeg::detect_scene_cuts(&media.path, p.config().scene_threshold)
        .await
        .map_err(|e| media_error(e, "SCENE_DETECT_FAILED"))?;

    let intervals = intervals_from_cuts(&cuts, media.duration_s);
    Ok(merge_short_scenes(intervals, MIN_SCENE_LEN_SECS))
}

// ---------------------------------------------------------------------------
// Stage 5: align
// ---------------------------------------------------------------------------

/// Pair every scene interval with its overlapping transcript text and
/// allocate the scene ids the sidecar and commit stages will use.
pub(crate) fn align(
    intervals: &[SceneInterval],
    segments: &[TranscriptSegment],
) -> Vec<SceneDraft> {
    intervals
        .iter()
        .map(|interval| SceneDraft {
            scene_id: Uuid::new_v4(),
            start_s: interval.start_s,
            end_s: interval.end_s,
            transcript: scene_transcript(segments, interval.start_s, interval.end_s),
            text_vec: None,
            frame_jpeg: None,
            image_vec: None,
            sidecar_key: None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stage 6: embed text
// ---------------------------------------------------------------------------

/// Batch-embed the non-empty transcripts. Scenes without speech keep a
/// null text vector.
pub(crate) async fn embed_text(p: &Pipeline, drafts: &mut [SceneDraft]) -> Result<(), StageError> {
    let indexed: Vec<usize> = drafts
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.transcript.is_empty())
        .map(|(i, _)| i)
        .collect();
    if indexed.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = indexed.iter().map(|&i| drafts[i].transcript.clone()).collect();
    let response = p.models().embed_text(&texts).await?;
    if response.embeddings.len() != texts.len() {
        return Err(StageError::fatal(
            "MODEL_MALFORMED",
            format!(
                "text embedding count {} != input count {}",
                response.embeddings.len(),
                texts.len()
            ),
        ));
    }

    for (&i, embedding) in indexed.iter().zip(response.embeddings) {
        drafts[i].text_vec = Some(normalized(embedding, TEXT_EMBEDDING_DIM, "text")?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 7: sample frames
// ---------------------------------------------------------------------------

/// Decode one representative frame per scene: the midpoint, falling back
/// to the scene start. A scene whose frames cannot be decoded is kept
/// without a vision embedding.
pub(crate) async fn sample_frames(
    p: &Pipeline,
    job: &Job,
    media: &MediaFile,
    drafts: &mut [SceneDraft],
) -> Result<(), StageError> {
    let total = drafts.len();
    for (i, draft) in drafts.iter_mut().enumerate() {
        let midpoint = (draft.start_s + draft.end_s) / 2.0;
        let frame = match ffmpeg::extract_frame_jpeg(&media.path, midpoint).await {
            Ok(frame) => Some(frame),
            Err(_) => match ffmpeg::extract_frame_jpeg(&media.path, draft.start_s).await {
                Ok(frame) => Some(frame),
                Err(e) => {
                    tracing::warn!(
                        scene_id = %draft.scene_id,
                        error = %e,
                        "Frame extraction failed, scene keeps no image vector"
                    );
                    None
                }
            },
        };
        draft.frame_jpeg = frame;

        let progress = ((i + 1) as f32 / total as f32) * 100.0;
        if let Err(e) = JobRepo::set_progress(p.pool(), job.job_id, progress).await {
            tracing::debug!(error = %e, "Progress update failed");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 8: embed vision
// ---------------------------------------------------------------------------

/// Batch-embed the sampled frames. Input order is preserved by the model
/// service, so results map back to drafts by position.
pub(crate) async fn embed_vision(p: &Pipeline, drafts: &mut [SceneDraft]) -> Result<(), StageError> {
    let indexed: Vec<usize> = drafts
        .iter()
        .enumerate()
        .filter(|(_, d)| d.frame_jpeg.is_some())
        .map(|(i, _)| i)
        .collect();
    if indexed.is_empty() {
        return Ok(());
    }

    let frames: Vec<Vec<u8>> = indexed
        .iter()
        .map(|&i| drafts[i].frame_jpeg.clone().unwrap_or_default())
        .collect();
    let response = p.models().embed_images(&frames).await?;
    if response.embeddings.len() != frames.len() {
        return Err(StageError::fatal(
            "MODEL_MALFORMED",
            format!(
                "vision embedding count {} != input count {}",
                response.embeddings.len(),
                frames.len()
            ),
        ));
    }

    for (&i, embedding) in indexed.iter().zip(response.embeddings) {
        drafts[i].image_vec = Some(normalized(embedding, VISION_EMBEDDING_DIM, "vision")?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 9: build sidecars
// ---------------------------------------------------------------------------

/// Produce and upload one immutable sidecar JSON per scene.
pub(crate) async fn build_sidecars(
    p: &Pipeline,
    video: &Video,
    drafts: &mut [SceneDraft],
) -> Result<(), StageError> {
    let bucket = p.storage().config().bucket_sidecars.clone();
    for draft in drafts.iter_mut() {
        let key = sidecar_object_key(video.user_id, video.video_id, draft.scene_id);
        let sidecar = SceneSidecar {
            scene_id: draft.scene_id,
            video_id: video.video_id,
            start_s: draft.start_s,
            end_s: draft.end_s,
            transcript: draft.transcript.clone(),
            vision_tags: serde_json::Map::new(),
        };
        let body = sidecar
            .to_bytes()
            .map_err(|e| StageError::fatal("INTERNAL", format!("sidecar encode: {e}")))?;

        p.storage()
            .put_object(&bucket, &key, Bytes::from(body), "application/json")
            .await?;
        draft.sidecar_key = Some(key);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 10: commit
// ---------------------------------------------------------------------------

/// Insert all scene rows, flip the video to `indexed`, and complete the
/// remaining job rows — one serializable transaction, all or nothing.
pub(crate) async fn commit(
    p: &Pipeline,
    video: &Video,
    drafts: &[SceneDraft],
) -> Result<(), StageError> {
    let scenes: Vec<NewScene> = drafts
        .iter()
        .map(|d| NewScene {
            scene_id: d.scene_id,
            start_s: d.start_s,
            end_s: d.end_s,
            transcript: d.transcript.clone(),
            text_vec: d.text_vec.clone(),
            image_vec: d.image_vec.clone(),
            vision_tags: serde_json::Value::Object(serde_json::Map::new()),
            sidecar_key: d.sidecar_key.clone().unwrap_or_default(),
        })
        .collect();

    let mut tx = p.pool().begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;

    SceneRepo::insert_all(&mut tx, video.video_id, &scenes).await?;
    VideoRepo::mark_indexed(&mut tx, video.video_id).await?;
    JobRepo::complete_active_for_video(&mut tx, video.video_id).await?;

    tx.commit().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Enforce dimensionality and re-normalize defensively. The service
/// already normalizes; a zero or wrongly-sized vector is malformed model
/// output and fatal.
fn normalized(
    mut embedding: Vec<f32>,
    expected_dim: usize,
    label: &str,
) -> Result<Vec<f32>, StageError> {
    if embedding.len() != expected_dim {
        return Err(StageError::fatal(
            "MODEL_MALFORMED",
            format!(
                "{label} embedding dimension {} != {expected_dim}",
                embedding.len()
            ),
        ));
    }
    if !l2_normalize(&mut embedding) {
        return Err(StageError::fatal(
            "MODEL_MALFORMED",
            format!("{label} embedding has zero norm"),
        ));
    }
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start_s: f64, end_s: f64) -> SceneInterval {
        SceneInterval { start_s, end_s }
    }

    #[test]
    fn align_assigns_transcripts_and_fresh_ids() {
        let intervals = vec![interval(0.0, 4.0), interval(4.0, 8.0)];
        let segments = vec![TranscriptSegment {
            start_s: 1.0,
            end_s: 2.0,
            text: "hello".to_string(),
        }];
        let drafts = align(&intervals, &segments);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].transcript, "hello");
        assert_eq!(drafts[1].transcript, "");
        assert_ne!(drafts[0].scene_id, drafts[1].scene_id);
    }

    #[test]
    fn normalized_rejects_wrong_dimension() {
        let err = normalized(vec![1.0; 8], TEXT_EMBEDDING_DIM, "text").unwrap_err();
        assert!(matches!(err, StageError::Fatal { ref reason, .. } if reason == "MODEL_MALFORMED"));
    }

    #[test]
    fn normalized_rejects_zero_vector() {
        let err = normalized(vec![0.0; TEXT_EMBEDDING_DIM], TEXT_EMBEDDING_DIM, "text").unwrap_err();
        assert!(matches!(err, StageError::Fatal { ref reason, .. } if reason == "MODEL_MALFORMED"));
    }

    #[test]
    fn normalized_renormalizes_defensively() {
        let mut v = vec![0.0; TEXT_EMBEDDING_DIM];
        v[0] = 2.0;
        let out = normalized(v, TEXT_EMBEDDING_DIM, "text").unwrap();
        assert!((out[0] - 1.0).abs() < 1e-6);
    }
}
