use scenedex_core::ffmpeg::DEFAULT_SCENE_THRESHOLD;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Model inference service base URL.
    pub model_service_url: String,
    /// Number of concurrent pipeline runners.
    pub concurrency: usize,
    /// Queue poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Scene-change score threshold for cut detection.
    pub scene_threshold: f64,
    /// Optional ISO-639-1 language hint forwarded to ASR.
    pub asr_language: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                 |
    /// |----------------------|-------------------------|
    /// | `MODEL_SERVICE_URL`  | `http://localhost:8001` |
    /// | `WORKER_CONCURRENCY` | `2`                     |
    /// | `POLL_INTERVAL_SECS` | `1`                     |
    /// | `SCENE_THRESHOLD`    | `0.3`                   |
    /// | `ASR_LANGUAGE`       | unset (autodetect)      |
    pub fn from_env() -> Self {
        let model_service_url = std::env::var("MODEL_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8001".into());

        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let scene_threshold: f64 = std::env::var("SCENE_THRESHOLD")
            .unwrap_or_else(|_| DEFAULT_SCENE_THRESHOLD.to_string())
            .parse()
            .expect("SCENE_THRESHOLD must be a valid f64");

        let asr_language = std::env::var("ASR_LANGUAGE").ok().filter(|s| !s.is_empty());

        Self {
            model_service_url,
            concurrency,
            poll_interval_secs,
            scene_threshold,
            asr_language,
        }
    }
}
