use std::sync::Arc;

use scenedex_storage::ObjectStorage;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: scenedex_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Object store gateway (presigned URLs, existence probes).
    pub storage: Arc<ObjectStorage>,
}
