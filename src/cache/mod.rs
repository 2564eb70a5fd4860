//! Local artifact cache plus the per-engine resident slots.
//!
//! [`DiskCache`] mirrors the remote layout on local disk. [`DatasetCache`]
//! and [`IndexCache`] hold the decoded dataset and deserialized indexes in
//! memory, one independently locked slot each.

pub mod dataset;
pub mod index;

pub use dataset::DatasetCache;
pub use index::{CachedArtifact, IndexCache};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use crate::error::{Result, VectorLakeError};

/// Artifact files under a cache root.
///
/// Keys are relative paths (`<namespace>/<file>`) and map to
/// `{root}/<namespace>/<file>`, so the local tree mirrors the remote one.
/// Writes go to a `.tmp` sibling and are renamed into place; leftover `.tmp`
/// files are removed when the cache is opened.
///
/// Entry sizes live in a `DashMap` so lookups never take a global lock.
pub struct DiskCache {
    root: PathBuf,
    entries: DashMap<String, u64>,
    total_size: AtomicU64,
}

impl DiskCache {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root).map_err(|e| {
            VectorLakeError::Cache(format!("failed to create cache dir {:?}: {}", root, e))
        })?;

        let cache = Self {
            root,
            entries: DashMap::new(),
            total_size: AtomicU64::new(0),
        };
        cache.rebuild_index_sync();
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rebuild the entry index from the two-level `<ns>/<file>` tree.
    fn rebuild_index_sync(&self) {
        let Ok(namespaces) = std::fs::read_dir(&self.root) else {
            return;
        };

        let mut total = 0u64;
        for ns in namespaces.flatten() {
            let ns_path = ns.path();
            if !ns_path.is_dir() {
                continue;
            }
            let Some(ns_name) = ns_path.file_name().and_then(|f| f.to_str()).map(str::to_string) else {
                continue;
            };
            let Ok(files) = std::fs::read_dir(&ns_path) else {
                continue;
            };
            for file in files.flatten() {
                let path = file.path();
                if !path.is_file() {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|f| f.to_str()) else {
                    continue;
                };
                if name.ends_with(".tmp") {
                    let _ = std::fs::remove_file(&path);
                    continue;
                }
                let Ok(meta) = file.metadata() else {
                    continue;
                };
                total += meta.len();
                self.entries.insert(format!("{ns_name}/{name}"), meta.len());
            }
        }
        self.total_size.store(total, Ordering::Relaxed);
    }

    /// Absolute path of `key` under the cache root.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Read `key` from disk.
    ///
    /// The file is authoritative: another cache over the same root may have
    /// written it after this one scanned the tree, so a key absent from the
    /// entry map is still looked up on disk and recorded when found.
    #[instrument(skip(self), fields(key = key))]
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        match tokio::fs::read(self.path(key)).await {
            Ok(data) => {
                if !self.entries.contains_key(key) {
                    self.record(key, data.len() as u64);
                    debug!("adopted file written by another cache");
                }
                crate::metrics::DISK_CACHE_TOTAL.with_label_values(&["hit"]).inc();
                debug!("cache hit");
                Some(Bytes::from(data))
            }
            Err(e) => {
                // Never written, or removed behind our back.
                self.forget(key);
                crate::metrics::DISK_CACHE_TOTAL.with_label_values(&["miss"]).inc();
                debug!(error = %e, "cache miss");
                None
            }
        }
    }

    /// Write `data` at `key`, replacing any previous file atomically.
    #[instrument(skip(self, data), fields(key = key, size = data.len()))]
    pub async fn put(&self, key: &str, data: &Bytes) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                VectorLakeError::Cache(format!("failed to create cache dir {:?}: {e}", parent))
            })?;
        }

        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| VectorLakeError::Cache(format!("invalid cache key {key:?}")))?;
        let tmp_path = path.with_file_name(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|e| VectorLakeError::Cache(format!("failed to write cache file: {e}")))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(VectorLakeError::Cache(format!("failed to rename cache file: {e}")));
        }

        self.record(key, data.len() as u64);
        debug!("cache put");
        Ok(())
    }

    /// Return the local copy of `key`, or run `fetch` and store its result.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        if let Some(data) = self.get(key).await {
            return Ok(data);
        }
        let data = fetch().await?;
        self.put(key, &data).await?;
        Ok(data)
    }

    /// Byte length of the file at `key`, read from disk.
    pub async fn size_of(&self, key: &str) -> Option<u64> {
        match tokio::fs::metadata(self.path(key)).await {
            Ok(meta) => Some(meta.len()),
            Err(e) => {
                warn!(key, error = %e, "cached artifact not readable");
                self.forget(key);
                None
            }
        }
    }

    /// Drop `key` from the cache and delete its file.
    #[instrument(skip(self), fields(key = key))]
    pub async fn invalidate(&self, key: &str) {
        if self.forget(key) {
            let _ = tokio::fs::remove_file(self.path(key)).await;
            debug!("invalidated cache key");
        }
    }

    fn record(&self, key: &str, size: u64) {
        if let Some(old) = self.entries.insert(key.to_string(), size) {
            self.total_size.fetch_sub(old, Ordering::Relaxed);
        }
        self.total_size.fetch_add(size, Ordering::Relaxed);
    }

    fn forget(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, size)) => {
                self.total_size.fetch_sub(size, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Total bytes of all cached files.
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Relaxed)
    }
}
