//! Text embedding via a BERT-family encoder (candle).
//!
//! Any 1024-hidden-dim BERT-architecture retrieval encoder works; the
//! loader refuses models whose hidden size does not match the scene
//! schema's text vector width.

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use tokenizers::Tokenizer;

use scenedex_core::vector::{l2_normalize, TEXT_EMBEDDING_DIM};

use super::require_file;

/// Maximum input length in tokens; longer transcripts are truncated.
const MAX_SEQ_LEN: usize = 512;

/// BERT-based text embedder producing CLS-pooled unit vectors.
pub struct TextEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl TextEmbedder {
    /// Load from a directory containing `config.json`, `tokenizer.json`,
    /// and `model.safetensors`.
    pub fn load(dir: &Path, device: &Device) -> Result<Self> {
        let config_path = require_file(dir, "config.json")?;
        let tokenizer_path = require_file(dir, "tokenizer.json")?;
        let weights_path = require_file(dir, "model.safetensors")?;

        let config: Config = serde_json::from_reader(std::fs::File::open(&config_path)?)
            .context("Failed to parse text encoder config")?;
        if config.hidden_size != TEXT_EMBEDDING_DIM {
            anyhow::bail!(
                "text encoder hidden size {} != required dimension {}",
                config.hidden_size,
                TEXT_EMBEDDING_DIM
            );
        }

        let tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| anyhow::anyhow!("{e}"))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device)? };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
        })
    }

    /// Embed one text into a unit-normalized vector of
    /// [`TEXT_EMBEDDING_DIM`] floats.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {e}"))?;

        let mut input_ids: Vec<u32> = encoding.get_ids().to_vec();
        input_ids.truncate(MAX_SEQ_LEN);
        let seq_len = input_ids.len();

        let input_ids = Tensor::new(&input_ids[..], &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::zeros((1, seq_len), candle_core::DType::U32, &self.device)?;
        let attention_mask = Tensor::ones((1, seq_len), candle_core::DType::U32, &self.device)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // CLS pooling: the first token's hidden state.
        let cls = hidden.i((0, 0))?;
        let mut embedding = cls.to_vec1::<f32>()?;
        if !l2_normalize(&mut embedding) {
            anyhow::bail!("text embedding has zero norm");
        }
        Ok(embedding)
    }

    /// Embed a batch sequentially, preserving input order.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}
