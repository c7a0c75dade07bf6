use std::path::PathBuf;

/// Model service configuration loaded from environment variables.
///
/// All model weights live under `MODELS_DIR`, pre-populated by the model
/// downloader; the service never downloads anything itself.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8001`).
    pub port: u16,
    /// Root of the local model cache.
    pub models_dir: PathBuf,
    /// Subdirectory of `models_dir` holding the Whisper ASR model.
    pub asr_model_dir: String,
    /// Subdirectory holding the text embedding encoder.
    pub text_model_dir: String,
    /// Subdirectory holding the SigLIP vision encoder.
    pub vision_model_dir: String,
    /// File name (under `models_dir`) of the ONNX face detector.
    pub face_model_file: String,
    /// `cpu` or `cuda`.
    pub device: String,
    /// Maximum concurrent inference requests before shedding load.
    pub max_concurrency: usize,
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default              |
    /// |--------------------|----------------------|
    /// | `HOST`             | `0.0.0.0`            |
    /// | `PORT`             | `8001`               |
    /// | `MODELS_DIR`       | `./models`           |
    /// | `ASR_MODEL_DIR`    | `whisper`            |
    /// | `TEXT_MODEL_DIR`   | `text-encoder`       |
    /// | `VISION_MODEL_DIR` | `siglip`             |
    /// | `FACE_MODEL_FILE`  | `face-detector.onnx` |
    /// | `DEVICE`           | `cpu`                |
    /// | `MAX_CONCURRENCY`  | `4`                  |
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8001".into())
                .parse()
                .expect("PORT must be a valid u16"),
            models_dir: std::env::var("MODELS_DIR")
                .unwrap_or_else(|_| "./models".into())
                .into(),
            asr_model_dir: std::env::var("ASR_MODEL_DIR").unwrap_or_else(|_| "whisper".into()),
            text_model_dir: std::env::var("TEXT_MODEL_DIR")
                .unwrap_or_else(|_| "text-encoder".into()),
            vision_model_dir: std::env::var("VISION_MODEL_DIR")
                .unwrap_or_else(|_| "siglip".into()),
            face_model_file: std::env::var("FACE_MODEL_FILE")
                .unwrap_or_else(|_| "face-detector.onnx".into()),
            device: std::env::var("DEVICE").unwrap_or_else(|_| "cpu".into()),
            max_concurrency: std::env::var("MAX_CONCURRENCY")
                .unwrap_or_else(|_| "4".into())
                .parse()
                .expect("MAX_CONCURRENCY must be a valid usize"),
        }
    }
}
