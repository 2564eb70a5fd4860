//! Resident raw dataset for one namespace.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use super::DiskCache;
use crate::artifact::ArtifactKey;
use crate::codec::{self, Dataset};
use crate::error::Result;
use crate::storage::BlobStore;

/// Where a brand-new namespace gets its vectors from.
#[derive(Debug, Clone)]
pub enum RawDataSource {
    /// An `.fvecs` file on the local filesystem.
    Path(PathBuf),
    /// An `.fvecs` payload already in memory.
    Bytes(Bytes),
}

impl RawDataSource {
    async fn read(&self) -> Result<Bytes> {
        match self {
            RawDataSource::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            RawDataSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Decoded dataset slot, filled at most once per engine.
///
/// A failed load leaves the slot empty so the next caller retries.
pub struct DatasetCache {
    key: ArtifactKey,
    store: Arc<dyn BlobStore>,
    disk: Arc<DiskCache>,
    slot: OnceCell<Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new(key: ArtifactKey, store: Arc<dyn BlobStore>, disk: Arc<DiskCache>) -> Self {
        Self {
            key,
            store,
            disk,
            slot: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.initialized()
    }

    /// The dataset, fetching and decoding it on first use.
    ///
    /// Concurrent first callers wait on the same load; exactly one remote
    /// `get` is issued.
    pub async fn ensure_loaded(&self) -> Result<Arc<Dataset>> {
        self.slot.get_or_try_init(|| self.load()).await.cloned()
    }

    #[instrument(skip(self), fields(key = %self.key.remote_key()))]
    async fn load(&self) -> Result<Arc<Dataset>> {
        let remote_key = self.key.remote_key();
        let bytes = self.store.get(&remote_key).await?;

        let payload = bytes.clone();
        let dataset = tokio::task::spawn_blocking(move || codec::decode(&payload)).await??;

        if let Err(e) = self.disk.put(&self.key.relative_path(), &bytes).await {
            warn!(error = %e, "failed to write local dataset copy");
        }

        crate::metrics::DATASET_LOADS_TOTAL.inc();
        info!(vectors = dataset.len(), dim = dataset.dim(), bytes = bytes.len(), "dataset loaded");
        Ok(Arc::new(dataset))
    }

    /// Upload `source` as the canonical remote dataset.
    ///
    /// The payload is decoded first so a malformed file never becomes the
    /// canonical copy. The resident slot is not touched.
    #[instrument(skip(self, source), fields(key = %self.key.remote_key()))]
    pub async fn ingest(&self, source: &RawDataSource) -> Result<()> {
        let bytes = source.read().await?;
        let dataset = codec::decode(&bytes)?;
        self.store.put(&self.key.remote_key(), bytes).await?;
        info!(vectors = dataset.len(), dim = dataset.dim(), "dataset uploaded");
        Ok(())
    }
}
