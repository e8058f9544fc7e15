//! S3-compatible storage backend built on the `object_store` client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload, RetryConfig};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AppConfig;

use super::storage::{StorageBackend, stored_reference};
use super::{ServiceError, ServiceResult};

/// Key prefix uploads live under inside the bucket.
const KEY_PREFIX: &str = "uploads";

/// Retry budget for transient faults. NotFound is never retried.
const MAX_RETRIES: usize = 5;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote backend speaking to S3 or an S3-compatible store (MinIO,
/// localstack).
///
/// Holds `dyn ObjectStore` rather than the concrete client so tests can
/// substitute an in-memory store; production construction goes through
/// [`S3Storage::from_config`].
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl S3Storage {
    /// Build the S3 client from configuration. Fails fast: a missing
    /// bucket name is rejected here, not on first use.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let bucket = cfg.s3_bucket.clone().ok_or_else(|| {
            anyhow::anyhow!("AWS_S3_BUCKET is required when the s3 backend is selected")
        })?;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&bucket)
            .with_region(&cfg.s3_region)
            .with_retry(RetryConfig {
                max_retries: MAX_RETRIES,
                ..RetryConfig::default()
            })
            .with_client_options(
                ClientOptions::new()
                    .with_connect_timeout(CONNECT_TIMEOUT)
                    .with_timeout(REQUEST_TIMEOUT),
            );

        if let Some(endpoint) = &cfg.s3_endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        match (&cfg.s3_access_key_id, &cfg.s3_secret_access_key) {
            (Some(key), Some(secret)) => {
                builder = builder
                    .with_access_key_id(key)
                    .with_secret_access_key(secret);
            }
            _ => {
                // No static credentials configured; issue unsigned requests
                // (anonymous MinIO-style access).
                builder = builder.with_skip_signature(true);
            }
        }

        let store = builder.build()?;
        info!(%bucket, region = %cfg.s3_region, "initialized s3 storage backend");
        Ok(Self {
            store: Arc::new(store),
            bucket,
        })
    }

    #[cfg(test)]
    fn with_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn save(&self, id: Uuid, content: Bytes, original_name: &str) -> ServiceResult<String> {
        let reference = format!("{KEY_PREFIX}/{}", stored_reference(id, original_name));
        let key = ObjectPath::from(reference.as_str());
        let size = content.len();

        self.store
            .put(&key, PutPayload::from(content))
            .await
            .map_err(|err| map_store_error(err, &reference))?;

        debug!(bucket = %self.bucket, %reference, bytes = size, "uploaded object");
        Ok(reference)
    }

    async fn read(&self, stored_reference: &str) -> ServiceResult<Bytes> {
        let key = ObjectPath::from(stored_reference);
        let result = self
            .store
            .get(&key)
            .await
            .map_err(|err| map_store_error(err, stored_reference))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|err| map_store_error(err, stored_reference))?;

        debug!(
            bucket = %self.bucket,
            reference = %stored_reference,
            bytes = bytes.len(),
            "downloaded object"
        );
        Ok(bytes)
    }

    async fn probe(&self) -> ServiceResult<()> {
        // A NotFound answer proves the store is reachable and responding.
        match self.store.head(&ObjectPath::from(".readyz-probe")).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(map_store_error(err, ".readyz-probe")),
        }
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}

/// NotFound stays NotFound; faults that survived the client's bounded
/// retries (connectivity, 5xx) surface as retryable; anything else is an
/// internal backend fault.
fn map_store_error(err: object_store::Error, reference: &str) -> ServiceError {
    match err {
        object_store::Error::NotFound { .. } => {
            ServiceError::NotFound(format!("Stored file `{reference}`"))
        }
        object_store::Error::Generic { source, .. } => ServiceError::Transient(source.to_string()),
        other => ServiceError::ObjectStore(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory_backend() -> S3Storage {
        S3Storage::with_store(Arc::new(InMemory::new()), "test-bucket")
    }

    #[tokio::test]
    async fn save_prefixes_references_and_round_trips() {
        let backend = memory_backend();
        let id = Uuid::new_v4();
        let content = Bytes::from_static(b"id,name\n1,Test\n");

        let reference = backend
            .save(id, content.clone(), "data.csv")
            .await
            .expect("save");
        assert_eq!(reference, format!("uploads/{id}_data.csv"));

        let read_back = backend.read(&reference).await.expect("read");
        assert_eq!(read_back, content);
    }

    #[tokio::test]
    async fn read_missing_object_is_not_found() {
        let backend = memory_backend();
        let err = backend.read("uploads/missing.csv").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn probe_succeeds_against_a_reachable_store() {
        assert!(memory_backend().probe().await.is_ok());
    }
}
