use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::models::ModelSet;

/// Shared state for the inference handlers.
#[derive(Clone)]
pub struct AppState {
    /// All loaded models.
    pub models: Arc<ModelSet>,
    /// Bounds concurrent inference; an exhausted semaphore means 503.
    pub permits: Arc<Semaphore>,
    /// Process start, for `/health` uptime.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(models: ModelSet, max_concurrency: usize) -> Self {
        Self {
            models: Arc::new(models),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            started_at: Instant::now(),
        }
    }
}
