//! Stage failure classification.
//!
//! Every stage error is either fatal (recorded on the video and job rows,
//! task completed, never retried) or transient (task abandoned so the
//! queue lease redelivers it).

use scenedex_model_client::ModelClientError;
use scenedex_storage::StorageError;

/// Error raised by a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Unrecoverable for this video. `reason` is the short code persisted
    /// as `error_text` (e.g. `DURATION_EXCEEDED`); `detail` is logged only.
    #[error("fatal: {reason}: {detail}")]
    Fatal { reason: String, detail: String },

    /// Worth retrying on a later delivery (dependency unreachable,
    /// database hiccup, lease race).
    #[error("transient: {0}")]
    Transient(String),
}

impl StageError {
    pub fn fatal(reason: &str, detail: impl std::fmt::Display) -> Self {
        Self::Fatal {
            reason: reason.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn transient(detail: impl std::fmt::Display) -> Self {
        Self::Transient(detail.to_string())
    }
}

impl From<sqlx::Error> for StageError {
    fn from(e: sqlx::Error) -> Self {
        StageError::transient(format!("database: {e}"))
    }
}

impl From<StorageError> for StageError {
    fn from(e: StorageError) -> Self {
        match e {
            // The uploaded object vanished; another delivery will not
            // bring it back.
            StorageError::NotFound { bucket, key } => {
                StageError::fatal("OBJECT_MISSING", format!("{bucket}/{key}"))
            }
            other => StageError::transient(format!("object store: {other}")),
        }
    }
}

impl From<ModelClientError> for StageError {
    fn from(e: ModelClientError) -> Self {
        match e {
            // The client already spent its full backoff budget against a
            // refusing service. Requeueing would immediately hammer the
            // same saturated service with another retry burst.
            ModelClientError::Saturated(_) => StageError::fatal("MODEL_SATURATED", e),
            // Genuine unreachability (network, DNS, timeout): worth
            // another delivery once the service is back.
            ModelClientError::Request(_) => {
                StageError::transient(format!("model service: {e}"))
            }
            // The service answered and rejected the request; retrying the
            // same payload cannot succeed.
            ModelClientError::HttpStatus { .. } => {
                StageError::fatal("MODEL_REJECTED", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_object_is_fatal() {
        let err: StageError = StorageError::NotFound {
            bucket: "uploads".into(),
            key: "a/b/c.mp4".into(),
        }
        .into();
        assert!(matches!(err, StageError::Fatal { ref reason, .. } if reason == "OBJECT_MISSING"));
    }

    #[test]
    fn exhausted_saturation_backoff_is_fatal() {
        let err: StageError = ModelClientError::Saturated(3).into();
        assert!(matches!(err, StageError::Fatal { ref reason, .. } if reason == "MODEL_SATURATED"));
    }

    #[test]
    fn model_rejection_is_fatal() {
        let err: StageError = ModelClientError::HttpStatus {
            status: 400,
            message: "bad audio".into(),
        }
        .into();
        assert!(matches!(err, StageError::Fatal { ref reason, .. } if reason == "MODEL_REJECTED"));
    }
}
