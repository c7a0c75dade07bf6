mod audio;
mod config;
mod error;
mod handlers;
mod models;
mod router;
mod state;

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::ServiceConfig;
use models::ModelSet;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenedex_model_service=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env();
    tracing::info!(
        models_dir = %config.models_dir.display(),
        device = %config.device,
        max_concurrency = config.max_concurrency,
        "Loading models (offline cache only)"
    );

    // Model loading is synchronous and heavy; do it before binding the
    // socket so readiness implies loaded models. A missing cache aborts
    // startup — no silent downloads.
    let models = tokio::task::spawn_blocking({
        let config = config.clone();
        move || ModelSet::load(&config)
    })
    .await
    .expect("Model loading task panicked")
    .expect("Failed to load models");

    tracing::info!(
        memory_used_bytes = models.memory_used_bytes,
        "All models loaded"
    );

    let state = AppState::new(models, config.max_concurrency);
    let app = router::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");
    tracing::info!(%addr, "Model inference service listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
