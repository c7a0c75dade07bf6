//! Face detection via a single-shot ONNX detector (ort).
//!
//! An Ultraface-style model: 320x240 RGB input, two outputs — per-prior
//! class scores `[1, N, 2]` and corner-form boxes `[1, N, 4]` in
//! normalized coordinates. Postprocessing is confidence filtering plus
//! non-maximum suppression.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use scenedex_model_client::protocol::FaceDetection;

/// Detector input width.
const INPUT_WIDTH: usize = 320;

/// Detector input height.
const INPUT_HEIGHT: usize = 240;

/// Minimum class score for a prior to count as a face.
const CONFIDENCE_THRESHOLD: f32 = 0.7;

/// IoU above which overlapping detections are suppressed.
const NMS_IOU_THRESHOLD: f32 = 0.3;

/// ONNX Runtime face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the detector from an ONNX file.
    pub fn load(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!(
                "face detector model not found at {} (models must be pre-downloaded)",
                model_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .with_intra_threads(2)
            .map_err(ort::Error::from)
            .context("Failed to set thread count")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        Ok(Self { session })
    }

    /// Detect faces in a decoded image. Boxes are returned in pixel
    /// coordinates of the original image as `[x, y, width, height]`.
    pub fn detect(&mut self, image: &image::DynamicImage) -> Result<Vec<FaceDetection>> {
        let (orig_w, orig_h) = (image.width() as f32, image.height() as f32);
        let input = preprocess(image);

        let input_value = Value::from_array(input).context("Failed to create input tensor")?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .context("ONNX inference failed")?;

        let (score_shape, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract score tensor")?;
        let (_box_shape, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .context("Failed to extract box tensor")?;

        let dims: Vec<usize> = score_shape.iter().map(|&d| d as usize).collect();
        let num_priors = dims.get(1).copied().unwrap_or(0);

        let mut candidates: Vec<FaceDetection> = Vec::new();
        for i in 0..num_priors {
            let face_score = scores[i * 2 + 1];
            if face_score < CONFIDENCE_THRESHOLD {
                continue;
            }
            let x1 = boxes[i * 4].clamp(0.0, 1.0) * orig_w;
            let y1 = boxes[i * 4 + 1].clamp(0.0, 1.0) * orig_h;
            let x2 = boxes[i * 4 + 2].clamp(0.0, 1.0) * orig_w;
            let y2 = boxes[i * 4 + 3].clamp(0.0, 1.0) * orig_h;
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            candidates.push(FaceDetection {
                bbox: [x1, y1, x2 - x1, y2 - y1],
                confidence: face_score,
            });
        }

        Ok(non_max_suppression(candidates))
    }
}

/// Resize to 320x240 and normalize to `(x - 127) / 128`, CHW layout.
fn preprocess(image: &image::DynamicImage) -> Array4<f32> {
    use image::imageops::FilterType;

    let resized = image.resize_exact(INPUT_WIDTH as u32, INPUT_HEIGHT as u32, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut input = Array4::<f32>::zeros((1, 3, INPUT_HEIGHT, INPUT_WIDTH));
    for y in 0..INPUT_HEIGHT {
        for x in 0..INPUT_WIDTH {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                input[[0, c, y, x]] = (pixel[c] as f32 - 127.0) / 128.0;
            }
        }
    }
    input
}

/// Greedy NMS keeping the highest-confidence detections.
fn non_max_suppression(mut detections: Vec<FaceDetection>) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceDetection> = Vec::new();
    for candidate in detections {
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) < NMS_IOU_THRESHOLD) {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection-over-union of two `[x, y, w, h]` boxes.
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ax2 = a[0] + a[2];
    let ay2 = a[1] + a[3];
    let bx2 = b[0] + b[2];
    let by2 = b[1] + b[3];

    let ix = (ax2.min(bx2) - a[0].max(b[0])).max(0.0);
    let iy = (ay2.min(by2) - a[1].max(b[1])).max(0.0);
    let intersection = ix * iy;

    let union = a[2] * a[3] + b[2] * b[3] - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}
