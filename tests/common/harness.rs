use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use tempfile::TempDir;
use uuid::Uuid;

use vectorlake::codec::{self, Dataset};
use vectorlake::config::{IndexingConfig, StorageBackend, StorageConfig};
use vectorlake::error::{Result, VectorLakeError};
use vectorlake::index::{IndexBackend, IndexRegistry, NativeBackend, NativeHandle, VariantParams};
use vectorlake::storage::{BlobStore, ObjectBlobStore};
use vectorlake::types::{IndexVariant, Neighbors};
use vectorlake::{RawDataSource, VectorDataEngine};

/// Shared store plus a unique namespace per test.
///
/// Defaults to the in-memory backend. `TEST_BACKEND=s3` or `minio` runs the
/// same tests against a real bucket; objects are removed on cleanup.
pub struct TestHarness {
    pub store: Arc<dyn BlobStore>,
    pub namespace: String,
    cache_root: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let backend = std::env::var("TEST_BACKEND").unwrap_or_else(|_| "memory".to_string());
        let bucket = std::env::var("TEST_S3_BUCKET").unwrap_or_else(|_| "vectorlake-test".to_string());

        let store: Arc<dyn BlobStore> = match backend.as_str() {
            "memory" => Arc::new(ObjectBlobStore::in_memory()),
            "s3" => Arc::new(
                ObjectBlobStore::from_config(&StorageConfig {
                    backend: StorageBackend::S3,
                    bucket,
                    s3_region: std::env::var("AWS_REGION").ok(),
                    s3_endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
                    s3_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                    s3_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                    s3_allow_http: std::env::var("S3_ALLOW_HTTP")
                        .map(|v| v == "true")
                        .unwrap_or(false),
                })
                .expect("failed to create store from config"),
            ),
            "minio" => Arc::new(
                ObjectBlobStore::from_config(&StorageConfig {
                    backend: StorageBackend::S3,
                    bucket,
                    s3_region: Some("us-east-1".to_string()),
                    s3_endpoint: Some(
                        std::env::var("MINIO_ENDPOINT")
                            .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                    ),
                    s3_access_key_id: Some(
                        std::env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
                    ),
                    s3_secret_access_key: Some(
                        std::env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
                    ),
                    s3_allow_http: true,
                })
                .expect("failed to create store from config"),
            ),
            other => panic!("unsupported TEST_BACKEND: {other}"),
        };

        Self {
            store,
            namespace: format!("test-{}", Uuid::new_v4()),
            cache_root: TempDir::new().expect("failed to create cache dir"),
        }
    }

    /// A fresh local cache root; engines given different roots share
    /// nothing but the remote store.
    pub fn cache_dir(&self, name: &str) -> PathBuf {
        self.cache_root.path().join(name)
    }

    pub fn remote_key(&self, file: &str) -> String {
        format!("vector_data/{}/{}", self.namespace, file)
    }

    /// Engine over this harness's store with the native backend.
    pub async fn engine(&self, cache: &str, raw: Option<RawDataSource>) -> VectorDataEngine {
        self.engine_with(Arc::clone(&self.store), NativeBackend::default(), cache, raw)
            .await
    }

    pub async fn engine_with<B: IndexBackend>(
        &self,
        store: Arc<dyn BlobStore>,
        backend: B,
        cache: &str,
        raw: Option<RawDataSource>,
    ) -> VectorDataEngine<B> {
        VectorDataEngine::with_parts(
            &self.namespace,
            store,
            backend,
            small_registry(),
            self.cache_dir(cache),
            raw,
        )
        .await
        .expect("failed to open engine")
    }

    /// Remove every artifact this test may have written.
    pub async fn cleanup(&self) {
        let mut files = vec!["data.fvecs".to_string()];
        files.extend(IndexVariant::ALL.iter().map(|v| format!("{}.index", v.name())));
        for file in files {
            let key = self.remote_key(&file);
            if let Ok(true) = self.store.exists(&key).await {
                if let Err(e) = self.store.delete(&key).await {
                    eprintln!("[test harness] warning: cleanup of {key} failed: {e}");
                }
            }
        }
    }
}

/// Parameters scaled down for small random datasets of dimension 16.
pub fn small_registry() -> IndexRegistry {
    IndexRegistry::from_config(&IndexingConfig {
        ivf_nlist: 8,
        ivf_nprobe: 8,
        pq_m: 4,
        pq_nbits: 6,
        ivfpq_m: 4,
        ivfpq_nbits: 6,
        hnsw_m: 16,
        kmeans_max_iterations: 10,
        ..IndexingConfig::default()
    })
}

pub fn random_dataset(n: usize, dim: usize) -> Dataset {
    let mut rng = rand::thread_rng();
    let values = (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Dataset::new(dim, values).expect("valid dataset")
}

pub fn fvecs(dataset: &Dataset) -> RawDataSource {
    RawDataSource::Bytes(codec::encode(dataset).expect("encodable dataset"))
}

/// Counts calls per operation, then delegates.
pub struct CountingStore {
    inner: Arc<dyn BlobStore>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    others: AtomicUsize,
    get_keys: std::sync::Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            others: AtomicUsize::new(0),
            get_keys: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.gets() + self.puts() + self.others.load(Ordering::SeqCst)
    }

    /// Number of `get` calls whose key ends with `suffix`.
    pub fn gets_for(&self, suffix: &str) -> usize {
        self.get_keys
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.get_keys.lock().unwrap().push(key.to_string());
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, data).await
    }

    async fn size(&self, key: &str) -> Result<u64> {
        self.others.fetch_add(1, Ordering::SeqCst);
        self.inner.size(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.others.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.others.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
}

/// Fails `get` for keys ending in `suffix` with a transport error while
/// enabled.
pub struct FaultyStore {
    inner: Arc<dyn BlobStore>,
    suffix: String,
    enabled: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn BlobStore>, suffix: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            suffix: suffix.to_string(),
            enabled: AtomicBool::new(true),
        })
    }

    pub fn heal(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FaultyStore {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        if self.enabled.load(Ordering::SeqCst) && key.ends_with(&self.suffix) {
            return Err(VectorLakeError::Transport {
                operation: "get",
                key: key.to_string(),
                source: object_store::Error::Generic {
                    store: "faulty",
                    source: "injected failure".into(),
                },
            });
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.inner.put(key, data).await
    }

    async fn size(&self, key: &str) -> Result<u64> {
        self.inner.size(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
}

/// Native backend that counts searches and can slow them down.
pub struct InstrumentedBackend {
    inner: NativeBackend,
    search_delay: Duration,
    pub searches: Arc<AtomicUsize>,
}

impl InstrumentedBackend {
    pub fn new(search_delay: Duration) -> Self {
        Self {
            inner: NativeBackend::default(),
            search_delay,
            searches: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl IndexBackend for InstrumentedBackend {
    type Handle = NativeHandle;

    fn create(&self, params: &VariantParams, dim: usize) -> Result<NativeHandle> {
        self.inner.create(params, dim)
    }

    fn train(&self, handle: &mut NativeHandle, vectors: &Dataset) -> Result<()> {
        self.inner.train(handle, vectors)
    }

    fn add(&self, handle: &mut NativeHandle, vectors: &Dataset) -> Result<()> {
        self.inner.add(handle, vectors)
    }

    fn search(&self, handle: &NativeHandle, query: &[f32], k: usize) -> Result<Neighbors> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if !self.search_delay.is_zero() {
            std::thread::sleep(self.search_delay);
        }
        self.inner.search(handle, query, k)
    }

    fn dimension(&self, handle: &NativeHandle) -> usize {
        self.inner.dimension(handle)
    }

    fn serialize(&self, handle: &NativeHandle) -> Result<Bytes> {
        self.inner.serialize(handle)
    }

    fn deserialize(&self, variant: IndexVariant, data: &[u8]) -> Result<NativeHandle> {
        self.inner.deserialize(variant, data)
    }
}
