//! HTTP client for the model inference service.
//!
//! The service sheds load with 503 when its inference slots are full;
//! callers retry with bounded exponential backoff (3 attempts, 250 ms
//! doubling) before giving up. Connection-level failures are retried the
//! same way. Any other HTTP error is returned immediately — a malformed
//! request will not improve on retry.

use std::time::Duration;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use scenedex_core::retry::{backoff_delay, DEPENDENCY_MAX_ATTEMPTS};

use crate::protocol::{
    DetectFacesRequest, DetectFacesResponse, EmbedImageRequest, EmbedImageResponse,
    EmbedTextRequest, EmbedTextResponse, FaceDetection, HealthResponse, TranscribeRequest,
    TranscribeResponse,
};

/// Inference can take minutes for long audio; generous per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Error type for model service calls.
#[derive(Debug, thiserror::Error)]
pub enum ModelClientError {
    /// The underlying HTTP request failed (network, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service kept refusing with 503 through all retries.
    #[error("model service saturated after {0} attempts")]
    Saturated(u32),

    /// The service returned a non-2xx status.
    #[error("model service returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
}

/// Client for the model inference service.
#[derive(Clone)]
pub struct ModelClient {
    base_url: String,
    client: reqwest::Client,
}

impl ModelClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Transcribe audio bytes, optionally hinting the spoken language.
    pub async fn transcribe(
        &self,
        audio: &[u8],
        language: Option<&str>,
    ) -> Result<TranscribeResponse, ModelClientError> {
        let request = TranscribeRequest {
            audio_base64: BASE64_STANDARD.encode(audio),
            language: language.map(str::to_string),
        };
        self.post_with_backoff("/asr/transcribe", &request).await
    }

    /// Embed a batch of texts; output order matches input order.
    pub async fn embed_text(&self, texts: &[String]) -> Result<EmbedTextResponse, ModelClientError> {
        let request = EmbedTextRequest {
            texts: texts.to_vec(),
        };
        self.post_with_backoff("/embed/text", &request).await
    }

    /// Embed a batch of encoded images; output order matches input order.
    pub async fn embed_images(
        &self,
        images: &[Vec<u8>],
    ) -> Result<EmbedImageResponse, ModelClientError> {
        let request = EmbedImageRequest {
            images_base64: images.iter().map(|i| BASE64_STANDARD.encode(i)).collect(),
        };
        self.post_with_backoff("/embed/image", &request).await
    }

    /// Detect faces in one encoded image.
    pub async fn detect_faces(&self, image: &[u8]) -> Result<Vec<FaceDetection>, ModelClientError> {
        let request = DetectFacesRequest {
            image_base64: BASE64_STANDARD.encode(image),
        };
        let response: DetectFacesResponse = self.post_with_backoff("/face/detect", &request).await?;
        Ok(response.faces)
    }

    /// Fetch service health, including the embedding dimensions.
    pub async fn health(&self) -> Result<HealthResponse, ModelClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ModelClientError::HttpStatus {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    /// POST with retry on saturation and connection failures.
    async fn post_with_backoff<Req, Resp>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp, ModelClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        for attempt in 0..DEPENDENCY_MAX_ATTEMPTS {
            let last = attempt + 1 == DEPENDENCY_MAX_ATTEMPTS;
            match self.try_post(&url, request).await {
                Ok(response) => return Ok(response),
                Err(ModelClientError::HttpStatus { status, message })
                    if status == StatusCode::SERVICE_UNAVAILABLE.as_u16() =>
                {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %url,
                        message = %message,
                        "Model service saturated, backing off"
                    );
                    if last {
                        return Err(ModelClientError::Saturated(DEPENDENCY_MAX_ATTEMPTS));
                    }
                }
                Err(ModelClientError::Request(e)) if e.is_connect() || e.is_timeout() => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %url,
                        error = %e,
                        "Model service unreachable, backing off"
                    );
                    if last {
                        return Err(ModelClientError::Request(e));
                    }
                }
                Err(other) => return Err(other),
            }

            tokio::time::sleep(backoff_delay(attempt)).await;
        }

        unreachable!("retry loop always returns on its final attempt")
    }

    /// Execute a single POST and decode the JSON response.
    async fn try_post<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp, ModelClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModelClientError::HttpStatus {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ModelClient::new("http://model-service:8001/");
        assert_eq!(client.base_url, "http://model-service:8001");
    }
}
