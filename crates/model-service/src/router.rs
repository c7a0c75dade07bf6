//! Router assembly for the inference endpoints.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/asr/transcribe", post(handlers::transcribe))
        .route("/embed/text", post(handlers::embed_text))
        .route("/embed/image", post(handlers::embed_image))
        .route("/face/detect", post(handlers::detect_faces))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
