mod config;
mod pipeline;
mod runner;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenedex_core::vector::{TEXT_EMBEDDING_DIM, VISION_EMBEDDING_DIM};
use scenedex_model_client::ModelClient;
use scenedex_storage::{ObjectStorage, StorageConfig};

use config::WorkerConfig;
use pipeline::Pipeline;
use runner::TaskRunner;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenedex_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        concurrency = config.concurrency,
        model_service_url = %config.model_service_url,
        "Loaded worker configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = scenedex_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    scenedex_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    // --- Object store ---
    let storage = Arc::new(ObjectStorage::new(StorageConfig::from_env()));
    storage
        .ensure_buckets()
        .await
        .expect("Failed to provision storage buckets");

    // --- Model service ---
    let models = ModelClient::new(config.model_service_url.clone());
    match models.health().await {
        Ok(health) => {
            // Dimension mismatches would poison every commit; refuse to start.
            assert_eq!(
                health.text_dimension, TEXT_EMBEDDING_DIM,
                "model service text dimension {} != schema {}",
                health.text_dimension, TEXT_EMBEDDING_DIM
            );
            assert_eq!(
                health.vision_dimension, VISION_EMBEDDING_DIM,
                "model service vision dimension {} != schema {}",
                health.vision_dimension, VISION_EMBEDDING_DIM
            );
            tracing::info!(
                loaded_models = ?health.loaded_models,
                device = %health.device,
                "Model service healthy"
            );
        }
        Err(e) => {
            // Not fatal: the pipeline retries per call, and the service
            // may simply still be loading models.
            tracing::warn!(error = %e, "Model service not reachable at startup");
        }
    }

    let pipeline = Arc::new(Pipeline::new(
        pool.clone(),
        storage,
        models,
        config.clone(),
    ));

    // --- Runners ---
    let cancel = CancellationToken::new();
    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let mut handles = Vec::with_capacity(config.concurrency);
    for _ in 0..config.concurrency {
        let runner = TaskRunner::new(pool.clone(), Arc::clone(&pipeline), poll_interval);
        let token = cancel.clone();
        handles.push(tokio::spawn(async move { runner.run(token).await }));
    }

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received, draining runners");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("Worker stopped");
}
