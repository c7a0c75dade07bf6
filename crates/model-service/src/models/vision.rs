//! Vision embedding via the SigLIP so400m vision tower (candle).

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::siglip;
use tokenizers::Tokenizer;

use scenedex_core::vector::{l2_normalize, VISION_EMBEDDING_DIM};

use super::require_file;

/// SigLIP so400m input resolution.
const IMAGE_SIZE: usize = 384;

/// SigLIP preprocessing uses a flat 0.5 mean and std per channel.
const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// SigLIP-based image embedder producing unit vectors.
pub struct VisionEmbedder {
    model: siglip::Model,
    device: Device,
}

impl VisionEmbedder {
    /// Load from a directory containing `model.safetensors` (and the
    /// tokenizer the text tower would use; probed to fail fast on an
    /// incomplete download even though only the vision tower runs here).
    pub fn load(dir: &Path, device: &Device) -> Result<Self> {
        let weights_path = require_file(dir, "model.safetensors")?;
        let tokenizer_path = require_file(dir, "tokenizer.json")?;
        let _ = Tokenizer::from_file(&tokenizer_path).map_err(|e| anyhow::anyhow!("{e}"))?;

        let config = siglip::Config::so400m_patch14_384();
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
        let model = siglip::Model::new(&config, vb).context("Failed to load SigLIP weights")?;

        Ok(Self {
            model,
            device: device.clone(),
        })
    }

    /// Embed one decoded image into a unit-normalized vector of
    /// [`VISION_EMBEDDING_DIM`] floats.
    pub fn embed(&self, image: &image::DynamicImage) -> Result<Vec<f32>> {
        let pixel_values = self.preprocess(image)?;
        let features = self.model.get_image_features(&pixel_values)?;

        let mut embedding = features.squeeze(0)?.to_vec1::<f32>()?;
        if embedding.len() != VISION_EMBEDDING_DIM {
            anyhow::bail!(
                "vision embedding dimension {} != {}",
                embedding.len(),
                VISION_EMBEDDING_DIM
            );
        }
        if !l2_normalize(&mut embedding) {
            anyhow::bail!("vision embedding has zero norm");
        }
        Ok(embedding)
    }

    /// Embed a batch sequentially, preserving input order.
    pub fn embed_batch(&self, images: &[image::DynamicImage]) -> Result<Vec<Vec<f32>>> {
        images.iter().map(|i| self.embed(i)).collect()
    }

    /// Resize to 384x384 RGB and normalize to `(x/255 - 0.5) / 0.5`,
    /// CHW layout.
    fn preprocess(&self, image: &image::DynamicImage) -> Result<Tensor> {
        use image::imageops::FilterType;

        let resized = image.resize_exact(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        let mut data = Vec::with_capacity(3 * IMAGE_SIZE * IMAGE_SIZE);
        for c in 0..3 {
            for y in 0..IMAGE_SIZE {
                for x in 0..IMAGE_SIZE {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    let value = pixel[c] as f32 / 255.0;
                    data.push((value - MEAN) / STD);
                }
            }
        }

        let tensor = Tensor::from_vec(data, (1, 3, IMAGE_SIZE, IMAGE_SIZE), &self.device)?;
        Ok(tensor)
    }
}
