//! Whisper speech recognition via candle.
//!
//! Weights, tokenizer, and mel filterbank load from the local cache
//! directory; nothing is downloaded. Audio is decoded greedily in 30 s
//! windows, each yielding one timed segment.

use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, audio, Config};
use tokenizers::Tokenizer;

use scenedex_core::scenes::TranscriptSegment;

use super::require_file;

/// Whisper's fixed decode window in seconds.
const CHUNK_SECS: usize = 30;

/// Maximum decoded tokens per window.
const MAX_DECODE_TOKENS: usize = 448;

/// Fallback language when no hint is given and the hint token is unknown.
const DEFAULT_LANGUAGE: &str = "en";

/// Whisper-based audio transcriber.
pub struct Transcriber {
    model: m::model::Whisper,
    tokenizer: Tokenizer,
    mel_filters: Vec<f32>,
    config: Config,
    device: Device,
}

impl Transcriber {
    /// Load the model from a directory containing `config.json`,
    /// `tokenizer.json`, `model.safetensors`, and the raw mel filterbank
    /// (`melfilters.bytes`, or `melfilters128.bytes` for 128-bin models).
    pub fn load(dir: &Path, device: &Device) -> Result<Self> {
        let config_path = require_file(dir, "config.json")?;
        let tokenizer_path = require_file(dir, "tokenizer.json")?;
        let weights_path = require_file(dir, "model.safetensors")?;

        let config: Config = serde_json::from_reader(std::fs::File::open(&config_path)?)
            .context("Failed to parse Whisper config")?;

        let tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| anyhow::anyhow!("{e}"))?;

        let mel_name = if config.num_mel_bins == 128 {
            "melfilters128.bytes"
        } else {
            "melfilters.bytes"
        };
        let mel_path = require_file(dir, mel_name)?;
        let mel_filters = load_mel_filters(&mel_path, config.num_mel_bins)?;

        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, device)? };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        Ok(Self {
            model,
            tokenizer,
            mel_filters,
            config,
            device: device.clone(),
        })
    }

    /// Transcribe mono 16 kHz samples into timed segments.
    ///
    /// Returns `(segments, language_used)`. Segment starts are
    /// monotonically non-decreasing by construction (one segment per
    /// window, windows in order).
    pub fn transcribe(
        &mut self,
        samples: &[f32],
        language: Option<&str>,
    ) -> Result<(Vec<TranscriptSegment>, String)> {
        let language = self.resolve_language(language);
        let language_token = self
            .token_id(&format!("<|{language}|>"))
            .context("Language token not found")?;

        let chunk_len = CHUNK_SECS * m::SAMPLE_RATE;
        let mut segments = Vec::new();

        for (chunk_index, chunk) in samples.chunks(chunk_len).enumerate() {
            let start_s = (chunk_index * CHUNK_SECS) as f64;
            let end_s = start_s + chunk.len() as f64 / m::SAMPLE_RATE as f64;

            let text = self.decode_chunk(chunk, language_token)?;
            if text.is_empty() {
                continue;
            }

            segments.push(TranscriptSegment {
                start_s,
                end_s,
                text,
            });
        }

        Ok((segments, language))
    }

    /// Greedy-decode one 30 s window.
    fn decode_chunk(&mut self, chunk: &[f32], language_token: u32) -> Result<String> {
        let mel = audio::pcm_to_mel(&self.config, chunk, &self.mel_filters);
        let mel_len = mel.len();
        let mel = Tensor::from_vec(
            mel,
            (
                1,
                self.config.num_mel_bins,
                mel_len / self.config.num_mel_bins,
            ),
            &self.device,
        )?;

        let sot_token = self
            .token_id("<|startoftranscript|>")
            .context("SOT token not found")?;
        let transcribe_token = self
            .token_id("<|transcribe|>")
            .context("Transcribe token not found")?;
        let eot_token = self
            .token_id("<|endoftext|>")
            .context("EOT token not found")?;
        let notimestamps_token = self
            .token_id("<|notimestamps|>")
            .context("No-timestamps token not found")?;

        let mut tokens = vec![
            sot_token,
            language_token,
            transcribe_token,
            notimestamps_token,
        ];

        let audio_features = self.model.encoder.forward(&mel, true)?;

        let mut decoded = Vec::new();
        for _ in 0..MAX_DECODE_TOKENS {
            let token_tensor = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
            let logits = self
                .model
                .decoder
                .forward(&token_tensor, &audio_features, true)?;

            let seq_len = logits.dim(1)?;
            let logits = logits.i((0, seq_len - 1))?;

            let next_token = logits.argmax(0)?.to_scalar::<u32>()?;
            if next_token == eot_token {
                break;
            }

            tokens.push(next_token);
            decoded.push(next_token);
        }

        let text = self
            .tokenizer
            .decode(&decoded, true)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(text.trim().to_string())
    }

    /// Use the hint when the tokenizer knows it; fall back to English.
    fn resolve_language(&self, hint: Option<&str>) -> String {
        if let Some(lang) = hint {
            if self.token_id(&format!("<|{lang}|>")).is_some() {
                return lang.to_string();
            }
            tracing::warn!(language = lang, "Unknown language hint, falling back");
        }
        DEFAULT_LANGUAGE.to_string()
    }

    fn token_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }
}

/// FFT bins per mel bin in Whisper's filterbank (n_fft/2 + 1 for
/// n_fft = 400).
const MEL_FILTER_FFT_BINS: usize = 201;

/// Load the mel filterbank from its raw little-endian f32 dump, the
/// artifact format the candle Whisper tooling ships.
fn load_mel_filters(path: &Path, num_mel_bins: usize) -> Result<Vec<f32>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("reading mel filterbank {}", path.display()))?;
    if raw.len() % 4 != 0 {
        bail!(
            "mel filterbank {} is not a whole number of f32 values ({} bytes)",
            path.display(),
            raw.len()
        );
    }

    let filters: Vec<f32> = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let expected = num_mel_bins * MEL_FILTER_FFT_BINS;
    if filters.len() != expected {
        bail!(
            "mel filterbank {} has {} coefficients, expected {expected} \
             ({num_mel_bins} mel bins x {MEL_FILTER_FFT_BINS} FFT bins)",
            path.display(),
            filters.len()
        );
    }
    Ok(filters)
}
