//! Remote blob storage.
//!
//! The engine talks to remote storage only through [`BlobStore`], so a
//! provider is swapped by injecting a different implementation rather than
//! by specializing the engine.

pub mod store;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use store::ObjectBlobStore;

/// Get/put of named blobs within one bucket.
///
/// Implementations report a missing object as `VectorLakeError::NotFound`
/// and every other failure as `VectorLakeError::Transport`. Callers never
/// retry; retry policy, if any, lives inside the implementation.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Identity of the bucket this store is bound to.
    fn bucket(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Size of the stored object in bytes.
    async fn size(&self, key: &str) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;
}
