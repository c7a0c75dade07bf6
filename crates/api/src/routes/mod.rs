//! Route definitions, one module per resource.

pub mod health;
pub mod video;

use axum::Router;

use crate::state::AppState;

/// All `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/videos", video::router())
}
