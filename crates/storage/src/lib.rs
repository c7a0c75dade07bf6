//! Object store gateway.
//!
//! A thin adapter over any S3-compatible store (MinIO in development):
//! bucket lifecycle for the three logical buckets, presigned PUT/GET URL
//! generation, and server-side object access for the pipeline. The gateway
//! is stateless and never inspects uploaded content.

use std::path::Path;
use std::time::Duration;

use aws_sdk_s3::config::{Builder, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

/// Error type for object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 request failed: {0}")]
    Request(String),

    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("presigning failed: {0}")]
    Presign(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flatten any SDK error into a request error, keeping the full chain.
fn sdk_err<E: std::fmt::Debug>(e: E) -> StorageError {
    StorageError::Request(format!("{e:?}"))
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Object store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Endpoint URL reachable from this process (e.g. `http://minio:9000`).
    pub endpoint: String,
    /// Endpoint reachable from browsers; substituted into presigned URLs
    /// when it differs from `endpoint`.
    pub external_endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_uploads: String,
    pub bucket_sidecars: String,
    pub bucket_tmp: String,
}

impl StorageConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `S3_ENDPOINT`             | `http://localhost:9000`  |
    /// | `S3_EXTERNAL_ENDPOINT`    | value of `S3_ENDPOINT`   |
    /// | `S3_REGION`               | `us-east-1`              |
    /// | `S3_ACCESS_KEY`           | `minioadmin`             |
    /// | `S3_SECRET_KEY`           | `minioadmin`             |
    /// | `STORAGE_BUCKET_UPLOADS`  | `uploads`                |
    /// | `STORAGE_BUCKET_SIDECARS` | `sidecars`               |
    /// | `STORAGE_BUCKET_TMP`      | `tmp`                    |
    pub fn from_env() -> Self {
        let endpoint =
            std::env::var("S3_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".into());
        let external_endpoint =
            std::env::var("S3_EXTERNAL_ENDPOINT").unwrap_or_else(|_| endpoint.clone());
        Self {
            endpoint,
            external_endpoint,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            access_key: std::env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into()),
            secret_key: std::env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into()),
            bucket_uploads: std::env::var("STORAGE_BUCKET_UPLOADS")
                .unwrap_or_else(|_| "uploads".into()),
            bucket_sidecars: std::env::var("STORAGE_BUCKET_SIDECARS")
                .unwrap_or_else(|_| "sidecars".into()),
            bucket_tmp: std::env::var("STORAGE_BUCKET_TMP").unwrap_or_else(|_| "tmp".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// S3-compatible object store client.
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    config: StorageConfig,
}

impl ObjectStorage {
    /// Build a client from configuration. Performs no network I/O; call
    /// [`Self::ensure_buckets`] at startup to provision the bucket set.
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        );

        let sdk_config = Builder::new()
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Ensure the `uploads`, `sidecars`, and `tmp` buckets exist.
    pub async fn ensure_buckets(&self) -> Result<(), StorageError> {
        for bucket in [
            self.config.bucket_uploads.clone(),
            self.config.bucket_sidecars.clone(),
            self.config.bucket_tmp.clone(),
        ] {
            let exists = self.client.head_bucket().bucket(&bucket).send().await.is_ok();
            if exists {
                continue;
            }
            self.client
                .create_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(sdk_err)?;
            tracing::info!(bucket = %bucket, "Created storage bucket");
        }
        Ok(())
    }

    /// Generate a presigned PUT URL bound to the object's content type and
    /// length. Returns the URL and its expiry timestamp.
    pub async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        content_length: i64,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length)
            .presigned(presigning)
            .await
            .map_err(sdk_err)?;

        let expires_at = Utc::now() + ttl;
        Ok((self.externalize_url(presigned.uri()), expires_at))
    }

    /// Generate a presigned GET URL.
    pub async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(sdk_err)?;

        Ok(self.externalize_url(presigned.uri()))
    }

    /// HEAD probe for object existence.
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(sdk_err(service_err))
                }
            }
        }
    }

    /// Fetch an object fully into memory.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    sdk_err(service_err)
                }
            })?;

        let data = response.body.collect().await.map_err(sdk_err)?;
        Ok(data.into_bytes())
    }

    /// Stream an object to a local file. Used by the pipeline so gigabyte
    /// uploads never sit fully in memory.
    pub async fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<u64, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    sdk_err(service_err)
                }
            })?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = body.try_next().await.map_err(sdk_err)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(bucket, key, bytes = written, "Downloaded object to file");
        Ok(written)
    }

    /// Upload an object.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    /// Delete an object. Deleting a missing key is not an error.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    /// Substitute the internal endpoint host with the browser-reachable one
    /// in a presigned URL. The store signs the host header, so both
    /// endpoints must resolve to the same instance.
    fn externalize_url(&self, url: &str) -> String {
        let internal = strip_scheme(&self.config.endpoint);
        let external = strip_scheme(&self.config.external_endpoint);
        if internal == external {
            return url.to_string();
        }
        url.replacen(&format!("://{internal}/"), &format!("://{external}/"), 1)
    }
}

/// Drop an `http://`/`https://` prefix from an endpoint.
fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, external: &str) -> StorageConfig {
        StorageConfig {
            endpoint: endpoint.to_string(),
            external_endpoint: external.to_string(),
            region: "us-east-1".to_string(),
            access_key: "test".to_string(),
            secret_key: "test".to_string(),
            bucket_uploads: "uploads".to_string(),
            bucket_sidecars: "sidecars".to_string(),
            bucket_tmp: "tmp".to_string(),
        }
    }

    #[test]
    fn strip_scheme_variants() {
        assert_eq!(strip_scheme("http://minio:9000"), "minio:9000");
        assert_eq!(strip_scheme("https://s3.example.com"), "s3.example.com");
        assert_eq!(strip_scheme("minio:9000"), "minio:9000");
    }

    #[test]
    fn externalize_rewrites_internal_host() {
        let storage = ObjectStorage::new(config("http://minio:9000", "http://localhost:9000"));
        let url = "http://minio:9000/uploads/a/b/clip.mp4?X-Amz-Signature=abc";
        assert_eq!(
            storage.externalize_url(url),
            "http://localhost:9000/uploads/a/b/clip.mp4?X-Amz-Signature=abc"
        );
    }

    #[test]
    fn externalize_is_identity_when_endpoints_match() {
        let storage = ObjectStorage::new(config("http://minio:9000", "http://minio:9000"));
        let url = "http://minio:9000/uploads/k?X-Amz-Signature=abc";
        assert_eq!(storage.externalize_url(url), url);
    }
}
