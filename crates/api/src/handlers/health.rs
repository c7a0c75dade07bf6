//! Health check handler.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /healthz
///
/// Liveness probe including a database round-trip.
pub async fn healthz(State(state): State<AppState>) -> AppResult<Json<Value>> {
    scenedex_db::health_check(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
