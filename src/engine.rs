//! `VectorDataEngine`: one namespace's dataset and indexes behind a single
//! handle.
//!
//! The engine owns its cache slots; share it across tasks with `Arc`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::artifact::{ArtifactKey, ArtifactKind, Namespace};
use crate::cache::{DatasetCache, DiskCache, IndexCache};
use crate::codec::Dataset;
use crate::config::Config;
use crate::error::{Result, VectorLakeError};
use crate::index::{IndexBackend, IndexRegistry, NativeBackend};
use crate::storage::{BlobStore, ObjectBlobStore};
use crate::types::{IndexVariant, Neighbors};

pub use crate::cache::dataset::RawDataSource;

/// Result count used by [`VectorDataEngine::search_default`].
pub const DEFAULT_TOP_K: usize = 100;

/// Per-variant outcome of [`VectorDataEngine::cache_all_indexes`].
///
/// A loaded variant maps to its serialized size in bytes.
#[derive(Debug, Default)]
pub struct CacheReport {
    results: BTreeMap<IndexVariant, Result<u64>>,
}

impl CacheReport {
    pub fn get(&self, variant: IndexVariant) -> Option<&Result<u64>> {
        self.results.get(&variant)
    }

    pub fn loaded(&self) -> Vec<IndexVariant> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(v, _)| *v)
            .collect()
    }

    pub fn failed(&self) -> Vec<(IndexVariant, &VectorLakeError)> {
        self.results
            .iter()
            .filter_map(|(v, r)| r.as_ref().err().map(|e| (*v, e)))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }
}

pub struct VectorDataEngine<B: IndexBackend = NativeBackend> {
    namespace: Namespace,
    store: Arc<dyn BlobStore>,
    backend: Arc<B>,
    registry: Arc<IndexRegistry>,
    disk: Arc<DiskCache>,
    dataset: Arc<DatasetCache>,
    indexes: IndexCache<B>,
}

impl VectorDataEngine<NativeBackend> {
    /// Open `namespace` with storage, cache root and index parameters taken
    /// from `config`, using the native index backend.
    ///
    /// When `raw` is given it is uploaded as the namespace's canonical
    /// dataset before this returns.
    pub async fn new(namespace: &str, config: &Config, raw: Option<RawDataSource>) -> Result<Self> {
        let namespace = Namespace::parse(namespace)?;
        let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::from_config(&config.storage)?);
        Self::open(
            namespace,
            store,
            NativeBackend::from_config(&config.indexing),
            IndexRegistry::from_config(&config.indexing),
            config.cache.dir.clone(),
            raw,
        )
        .await
    }
}

impl<B: IndexBackend> VectorDataEngine<B> {
    /// Open `namespace` over injected collaborators.
    ///
    /// The namespace is validated before any storage call.
    pub async fn with_parts(
        namespace: &str,
        store: Arc<dyn BlobStore>,
        backend: B,
        registry: IndexRegistry,
        cache_dir: impl Into<PathBuf>,
        raw: Option<RawDataSource>,
    ) -> Result<Self> {
        let namespace = Namespace::parse(namespace)?;
        Self::open(namespace, store, backend, registry, cache_dir.into(), raw).await
    }

    #[instrument(skip_all, fields(namespace = %namespace, bucket = store.bucket()))]
    async fn open(
        namespace: Namespace,
        store: Arc<dyn BlobStore>,
        backend: B,
        registry: IndexRegistry,
        cache_dir: PathBuf,
        raw: Option<RawDataSource>,
    ) -> Result<Self> {
        let disk = Arc::new(DiskCache::new(cache_dir)?);
        let backend = Arc::new(backend);
        let registry = Arc::new(registry);
        let dataset = Arc::new(DatasetCache::new(
            ArtifactKey::new(&namespace, ArtifactKind::RawData),
            Arc::clone(&store),
            Arc::clone(&disk),
        ));
        let indexes = IndexCache::new(
            namespace.clone(),
            Arc::clone(&store),
            Arc::clone(&disk),
            Arc::clone(&backend),
            Arc::clone(&registry),
            Arc::clone(&dataset),
        );

        if let Some(source) = raw {
            dataset.ingest(&source).await?;
        }

        info!(
            cache_dir = %disk.root().display(),
            cached_bytes = disk.total_size(),
            "engine ready"
        );
        Ok(Self {
            namespace,
            store,
            backend,
            registry,
            disk,
            dataset,
            indexes,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    pub fn cache_dir(&self) -> &Path {
        self.disk.root()
    }

    pub fn is_dataset_loaded(&self) -> bool {
        self.dataset.is_loaded()
    }

    /// Variants currently resident in memory.
    pub async fn resident_variants(&self) -> Vec<IndexVariant> {
        self.indexes.resident_variants().await
    }

    /// The full dataset. Fetched from the remote store on first call only.
    pub async fn get_vector_array(&self) -> Result<Arc<Dataset>> {
        self.dataset.ensure_loaded().await
    }

    /// Build (or rebuild) `variant` from the current dataset, persist it and
    /// make it resident. Searches already running keep the previous index.
    pub async fn create_index(&self, variant: IndexVariant) -> Result<()> {
        self.indexes.build(variant).await.map(|_| ())
    }

    /// Up to `k` nearest neighbours of `query` in `variant`, nearest first.
    ///
    /// A query whose length differs from the index dimension fails with
    /// `DimensionMismatch` before the backend is called.
    #[instrument(skip(self, query), fields(namespace = %self.namespace, variant = %variant))]
    pub async fn search(&self, query: &[f32], variant: IndexVariant, k: usize) -> Result<Neighbors> {
        let artifact = self.indexes.ensure_loaded(variant).await?;
        if query.len() != artifact.dim {
            return Err(VectorLakeError::DimensionMismatch {
                expected: artifact.dim,
                actual: query.len(),
            });
        }

        let start = Instant::now();
        let backend = Arc::clone(&self.backend);
        let query = query.to_vec();
        let neighbors =
            tokio::task::spawn_blocking(move || backend.search(&artifact.handle, &query, k)).await??;

        crate::metrics::SEARCH_DURATION
            .with_label_values(&[variant.name()])
            .observe(start.elapsed().as_secs_f64());
        debug!(results = neighbors.len(), "search complete");
        Ok(neighbors)
    }

    /// [`search`](Self::search) against the flat index with
    /// [`DEFAULT_TOP_K`] results.
    pub async fn search_default(&self, query: &[f32]) -> Result<Neighbors> {
        self.search(query, IndexVariant::default(), DEFAULT_TOP_K).await
    }

    /// Make every registered variant resident. Variants load concurrently
    /// and independently; one failure never stops the others.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn cache_all_indexes(&self) -> CacheReport {
        let loads = self.registry.variants().map(|variant| async move {
            let result = self
                .indexes
                .ensure_loaded(variant)
                .await
                .map(|artifact| artifact.size_bytes);
            (variant, result)
        });

        let mut report = CacheReport::default();
        for (variant, result) in join_all(loads).await {
            if let Err(e) = &result {
                warn!(%variant, error = %e, "failed to cache index");
            }
            report.results.insert(variant, result);
        }
        info!(
            loaded = report.loaded().len(),
            failed = report.failed().len(),
            "cached indexes"
        );
        report
    }

    /// Byte length of `variant`'s local artifact, loading it if needed.
    pub async fn get_index_size(&self, variant: IndexVariant) -> Result<u64> {
        self.indexes.size_of(variant).await
    }
}
