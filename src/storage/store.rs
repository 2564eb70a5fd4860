use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use super::BlobStore;
use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Result, VectorLakeError};

/// [`BlobStore`] over the `object_store` crate: S3-compatible endpoints,
/// the local filesystem, or process memory.
#[derive(Clone)]
pub struct ObjectBlobStore {
    inner: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectBlobStore {
    /// Create a new store from configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            StorageBackend::S3 => {
                let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);

                if let Some(ref region) = config.s3_region {
                    builder = builder.with_region(region);
                }
                if let Some(ref endpoint) = config.s3_endpoint {
                    if !endpoint.is_empty() {
                        builder = builder.with_endpoint(endpoint);
                    }
                }
                if let Some(ref key_id) = config.s3_access_key_id {
                    builder = builder.with_access_key_id(key_id);
                }
                if let Some(ref secret) = config.s3_secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                if config.s3_allow_http {
                    builder = builder.with_allow_http(true);
                }

                // Index artifacts can be large; allow slow transfers but fail
                // fast on unreachable endpoints.
                let client_options = ClientOptions::new()
                    .with_timeout(Duration::from_secs(300))
                    .with_connect_timeout(Duration::from_secs(10));
                builder = builder.with_client_options(client_options);

                Arc::new(builder.build().map_err(|e| {
                    VectorLakeError::Config(format!("failed to build S3 store: {e}"))
                })?)
            }
            StorageBackend::Local => {
                let path = std::path::Path::new(&config.bucket);
                if !path.exists() {
                    std::fs::create_dir_all(path)?;
                }
                Arc::new(
                    object_store::local::LocalFileSystem::new_with_prefix(path).map_err(|e| {
                        VectorLakeError::Config(format!("failed to build local store: {e}"))
                    })?,
                )
            }
            StorageBackend::Memory => Arc::new(object_store::memory::InMemory::new()),
        };

        Ok(Self {
            inner: store,
            bucket: config.bucket.clone(),
        })
    }

    /// Create a store directly from an ObjectStore instance.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            inner: store,
            bucket: bucket.into(),
        }
    }

    /// Fresh in-memory store (for testing).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), "memory")
    }

    fn observe(operation: &str, start: Instant) {
        let elapsed = start.elapsed();
        debug!(elapsed_ms = elapsed.as_millis(), operation, "store op");
        crate::metrics::STORE_OPERATION_DURATION
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    fn failed(operation: &'static str, key: &str, err: object_store::Error) -> VectorLakeError {
        let err = VectorLakeError::from_store(operation, key, err);
        if !err.is_not_found() {
            crate::metrics::STORE_ERRORS_TOTAL
                .with_label_values(&[operation])
                .inc();
        }
        err
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get an object by key. Returns NotFound if it doesn't exist.
    #[instrument(skip(self), fields(bucket = %self.bucket, key = key))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let start = Instant::now();
        let path = Path::parse(key)?;
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| Self::failed("get", key, e))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| Self::failed("get", key, e))?;
        debug!(size = bytes.len(), "store get");
        Self::observe("get", start);
        Ok(bytes)
    }

    /// Put an object at the given key, replacing any previous version.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = key, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let start = Instant::now();
        let path = Path::parse(key)?;
        self.inner
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| Self::failed("put", key, e))?;
        Self::observe("put", start);
        Ok(())
    }

    /// Head request: object size without downloading it.
    #[instrument(skip(self), fields(bucket = %self.bucket, key = key))]
    async fn size(&self, key: &str) -> Result<u64> {
        let start = Instant::now();
        let path = Path::parse(key)?;
        let meta = self
            .inner
            .head(&path)
            .await
            .map_err(|e| Self::failed("head", key, e))?;
        Self::observe("head", start);
        Ok(meta.size as u64)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = key))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let start = Instant::now();
        let path = Path::parse(key)?;
        let result = match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(Self::failed("exists", key, e)),
        };
        Self::observe("exists", start);
        result
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = key))]
    async fn delete(&self, key: &str) -> Result<()> {
        let start = Instant::now();
        let path = Path::parse(key)?;
        self.inner
            .delete(&path)
            .await
            .map_err(|e| Self::failed("delete", key, e))?;
        Self::observe("delete", start);
        Ok(())
    }
}
