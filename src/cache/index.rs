//! Resident index artifacts, one slot per [`IndexVariant`].
//!
//! Each slot pairs the resident artifact (`RwLock<Option<Arc<..>>>`) with a
//! load mutex. Readers only touch the `RwLock` and clone the `Arc`, so a
//! rebuild swapping in a new artifact never disturbs searches already
//! running against the old one. Loads and builds of one variant serialize
//! on that variant's mutex and never block other slots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::{DatasetCache, DiskCache};
use crate::artifact::{ArtifactKey, ArtifactKind, Namespace};
use crate::error::{Result, VectorLakeError};
use crate::index::{IndexBackend, IndexRegistry};
use crate::storage::BlobStore;
use crate::types::IndexVariant;

/// A deserialized index ready for queries.
#[derive(Debug)]
pub struct CachedArtifact<H> {
    pub variant: IndexVariant,
    pub handle: H,
    /// Dimension the index was built for.
    pub dim: usize,
    /// Serialized length in bytes.
    pub size_bytes: u64,
    /// Increases every time a slot receives a new artifact.
    pub version: u64,
}

struct Slot<H> {
    resident: RwLock<Option<Arc<CachedArtifact<H>>>>,
    load_lock: Mutex<()>,
}

impl<H> Slot<H> {
    fn new() -> Self {
        Self {
            resident: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }
}

pub struct IndexCache<B: IndexBackend> {
    namespace: Namespace,
    store: Arc<dyn BlobStore>,
    disk: Arc<DiskCache>,
    backend: Arc<B>,
    registry: Arc<IndexRegistry>,
    dataset: Arc<DatasetCache>,
    slots: [Slot<B::Handle>; 6],
    next_version: AtomicU64,
}

impl<B: IndexBackend> IndexCache<B> {
    pub fn new(
        namespace: Namespace,
        store: Arc<dyn BlobStore>,
        disk: Arc<DiskCache>,
        backend: Arc<B>,
        registry: Arc<IndexRegistry>,
        dataset: Arc<DatasetCache>,
    ) -> Self {
        Self {
            namespace,
            store,
            disk,
            backend,
            registry,
            dataset,
            slots: std::array::from_fn(|_| Slot::new()),
            next_version: AtomicU64::new(1),
        }
    }

    fn slot(&self, variant: IndexVariant) -> &Slot<B::Handle> {
        &self.slots[variant.slot()]
    }

    fn key(&self, variant: IndexVariant) -> ArtifactKey {
        ArtifactKey::new(&self.namespace, ArtifactKind::Index(variant))
    }

    /// The resident artifact, if any, without loading.
    pub async fn resident(&self, variant: IndexVariant) -> Option<Arc<CachedArtifact<B::Handle>>> {
        self.slot(variant).resident.read().await.clone()
    }

    async fn install(&self, variant: IndexVariant, handle: B::Handle, size_bytes: u64) -> Arc<CachedArtifact<B::Handle>> {
        let artifact = Arc::new(CachedArtifact {
            variant,
            dim: self.backend.dimension(&handle),
            handle,
            size_bytes,
            version: self.next_version.fetch_add(1, Ordering::Relaxed),
        });
        *self.slot(variant).resident.write().await = Some(Arc::clone(&artifact));
        artifact
    }

    /// Rebuild `variant` from the dataset, persist it locally and remotely,
    /// then replace the resident artifact.
    ///
    /// Always runs the full build, even when an artifact already exists.
    #[instrument(skip(self), fields(namespace = %self.namespace, variant = %variant))]
    pub async fn build(&self, variant: IndexVariant) -> Result<Arc<CachedArtifact<B::Handle>>> {
        let _guard = self.slot(variant).load_lock.lock().await;
        let dataset = self.dataset.ensure_loaded().await?;

        let start = Instant::now();
        let params = self.registry.params(variant).clone();
        let backend = Arc::clone(&self.backend);
        let (handle, bytes) = tokio::task::spawn_blocking(move || -> Result<(B::Handle, Bytes)> {
            let handle = backend
                .build(&params, &dataset)
                .map_err(|e| as_build_error(variant, e))?;
            let bytes = backend.serialize(&handle)?;
            Ok((handle, bytes))
        })
        .await??;

        // Remote first: a failed upload must not leave a local file newer
        // than both the remote and the resident copies.
        let key = self.key(variant);
        let relative = key.relative_path();
        self.store.put(&key.remote_key(), bytes.clone()).await?;
        if let Err(e) = self.disk.put(&relative, &bytes).await {
            self.disk.invalidate(&relative).await;
            return Err(e);
        }

        let elapsed = start.elapsed();
        crate::metrics::INDEX_BUILD_DURATION
            .with_label_values(&[variant.name()])
            .observe(elapsed.as_secs_f64());
        crate::metrics::INDEX_LOADS_TOTAL
            .with_label_values(&[variant.name(), "build"])
            .inc();

        let artifact = self.install(variant, handle, bytes.len() as u64).await;
        info!(
            size_bytes = artifact.size_bytes,
            version = artifact.version,
            elapsed_ms = elapsed.as_millis() as u64,
            "index built"
        );
        Ok(artifact)
    }

    /// The resident artifact, loading it from the local cache or the remote
    /// store on first use.
    ///
    /// Concurrent first callers wait on the slot's mutex and share one
    /// fetch. Fails with `ArtifactMissing` when the variant was never built.
    pub async fn ensure_loaded(&self, variant: IndexVariant) -> Result<Arc<CachedArtifact<B::Handle>>> {
        if let Some(artifact) = self.resident(variant).await {
            return Ok(artifact);
        }

        let _guard = self.slot(variant).load_lock.lock().await;
        if let Some(artifact) = self.resident(variant).await {
            debug!(%variant, "index loaded by concurrent caller");
            return Ok(artifact);
        }
        self.load(variant).await
    }

    #[instrument(skip(self), fields(namespace = %self.namespace, variant = %variant))]
    async fn load(&self, variant: IndexVariant) -> Result<Arc<CachedArtifact<B::Handle>>> {
        let key = self.key(variant);
        let relative = key.relative_path();

        let mut fetched = false;
        let bytes = self
            .disk
            .get_or_fetch(&relative, || {
                fetched = true;
                self.fetch_remote(variant, key.remote_key())
            })
            .await?;
        let source = if fetched { "remote" } else { "disk" };

        let backend = Arc::clone(&self.backend);
        let payload = bytes.clone();
        let handle = tokio::task::spawn_blocking(move || backend.deserialize(variant, &payload)).await?;

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                // Unreadable local copy; drop it so the next attempt refetches.
                warn!(source, error = %e, "failed to deserialize index artifact");
                self.disk.invalidate(&relative).await;
                return Err(e);
            }
        };

        crate::metrics::INDEX_LOADS_TOTAL
            .with_label_values(&[variant.name(), source])
            .inc();
        let artifact = self.install(variant, handle, bytes.len() as u64).await;
        info!(source, size_bytes = artifact.size_bytes, "index loaded");
        Ok(artifact)
    }

    async fn fetch_remote(&self, variant: IndexVariant, remote_key: String) -> Result<Bytes> {
        self.store.get(&remote_key).await.map_err(|e| {
            if e.is_not_found() {
                VectorLakeError::ArtifactMissing {
                    namespace: self.namespace.to_string(),
                    variant,
                }
            } else {
                e
            }
        })
    }

    /// Byte length of the local artifact file, loading the variant first.
    ///
    /// A local file removed after the load is restored from the remote
    /// store before it is measured.
    pub async fn size_of(&self, variant: IndexVariant) -> Result<u64> {
        self.ensure_loaded(variant).await?;
        let key = self.key(variant);
        let relative = key.relative_path();
        if let Some(size) = self.disk.size_of(&relative).await {
            return Ok(size);
        }

        warn!(%variant, "local artifact missing, restoring from remote");
        self.disk
            .get_or_fetch(&relative, || self.fetch_remote(variant, key.remote_key()))
            .await?;
        self.disk.size_of(&relative).await.ok_or_else(|| {
            VectorLakeError::Cache(format!("local artifact {relative} unreadable after restore"))
        })
    }

    /// Variants with a resident artifact, in slot order.
    pub async fn resident_variants(&self) -> Vec<IndexVariant> {
        let mut out = Vec::new();
        for variant in IndexVariant::ALL {
            if self.slot(variant).resident.read().await.is_some() {
                out.push(variant);
            }
        }
        out
    }
}

/// Backend failures during a build surface as `IndexBuild`.
fn as_build_error(variant: IndexVariant, err: VectorLakeError) -> VectorLakeError {
    match err {
        VectorLakeError::IndexBuild { .. } => err,
        other => VectorLakeError::IndexBuild {
            variant,
            reason: other.to_string(),
        },
    }
}
