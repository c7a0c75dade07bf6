//! Model lifecycle: load everything once at startup, fail fast on a
//! missing cache.
//!
//! The service holds all model memory for the deployment; every other
//! component talks to it over the network. Models are wrapped in mutexes
//! and executed on blocking threads; the request semaphore in the HTTP
//! layer bounds how many of those run at once.

pub mod asr;
pub mod face;
pub mod text;
pub mod vision;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use candle_core::Device;

use crate::config::ServiceConfig;

pub use asr::Transcriber;
pub use face::FaceDetector;
pub use text::TextEmbedder;
pub use vision::VisionEmbedder;

/// Resolve a required model file, failing with a download hint when absent.
///
/// The service runs strictly offline: a missing file means the model
/// downloader has not populated the cache, and starting anyway would only
/// fail later and slower.
pub(crate) fn require_file(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if !path.exists() {
        anyhow::bail!(
            "model file not found at {} (models must be pre-downloaded into the cache)",
            path.display()
        );
    }
    Ok(path)
}

/// All loaded models plus bookkeeping for `/health`.
pub struct ModelSet {
    pub asr: Mutex<Transcriber>,
    pub text: Mutex<TextEmbedder>,
    pub vision: Mutex<VisionEmbedder>,
    pub face: Mutex<FaceDetector>,
    pub device_label: String,
    /// Sum of model file sizes; a stable lower bound for resident model
    /// memory, reported by `/health`.
    pub memory_used_bytes: u64,
}

impl ModelSet {
    /// Load every model from the local cache. Any missing or unloadable
    /// model aborts startup.
    pub fn load(config: &ServiceConfig) -> Result<ModelSet> {
        let device = resolve_device(&config.device)?;
        let dir = &config.models_dir;

        let started = Instant::now();
        let asr_dir = dir.join(&config.asr_model_dir);
        let asr = Transcriber::load(&asr_dir, &device)
            .with_context(|| format!("loading ASR model from {}", asr_dir.display()))?;
        tracing::info!(elapsed_s = started.elapsed().as_secs_f32(), "Whisper loaded");

        let started = Instant::now();
        let text_dir = dir.join(&config.text_model_dir);
        let text = TextEmbedder::load(&text_dir, &device)
            .with_context(|| format!("loading text encoder from {}", text_dir.display()))?;
        tracing::info!(elapsed_s = started.elapsed().as_secs_f32(), "Text encoder loaded");

        let started = Instant::now();
        let vision_dir = dir.join(&config.vision_model_dir);
        let vision = VisionEmbedder::load(&vision_dir, &device)
            .with_context(|| format!("loading vision encoder from {}", vision_dir.display()))?;
        tracing::info!(elapsed_s = started.elapsed().as_secs_f32(), "Vision encoder loaded");

        let started = Instant::now();
        let face_path = dir.join(&config.face_model_file);
        let face = FaceDetector::load(&face_path)
            .with_context(|| format!("loading face detector from {}", face_path.display()))?;
        tracing::info!(elapsed_s = started.elapsed().as_secs_f32(), "Face detector loaded");

        let memory_used_bytes = weight_file_bytes(&[
            asr_dir.join("model.safetensors"),
            text_dir.join("model.safetensors"),
            vision_dir.join("model.safetensors"),
            face_path,
        ]);

        Ok(ModelSet {
            asr: Mutex::new(asr),
            text: Mutex::new(text),
            vision: Mutex::new(vision),
            face: Mutex::new(face),
            device_label: config.device.clone(),
            memory_used_bytes,
        })
    }

    /// Model names for `/health`.
    pub fn loaded_models(&self) -> Vec<String> {
        vec![
            "whisper".to_string(),
            "text-encoder".to_string(),
            "siglip".to_string(),
            "face-detector".to_string(),
        ]
    }
}

/// Map the configured device name onto a candle device.
fn resolve_device(name: &str) -> Result<Device> {
    match name {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0).context("CUDA device requested but unavailable"),
        other => anyhow::bail!("unknown device '{other}' (expected 'cpu' or 'cuda')"),
    }
}

/// Sum the sizes of the given weight files, ignoring unreadable entries.
fn weight_file_bytes(paths: &[PathBuf]) -> u64 {
    paths
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum()
}
