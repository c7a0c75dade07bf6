use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error type for inference handlers.
///
/// Produces `{ "error": ..., "code": ... }` JSON bodies. `Saturated` is
/// the backpressure refusal clients retry with exponential backoff.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// All inference slots are busy; the caller should back off and retry.
    #[error("inference capacity exhausted")]
    Saturated,

    /// The request payload is unusable (bad base64, undecodable media,
    /// empty batch).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Model execution failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ServiceError::Saturated => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SATURATED",
                self.to_string(),
            ),
            ServiceError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
            }
            ServiceError::Inference(msg) => {
                tracing::error!(error = %msg, "Inference failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INFERENCE_FAILED",
                    "Inference failed".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
