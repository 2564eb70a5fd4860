//! Core trait for ANN index libraries.
//!
//! The caches never look inside an index: they create, train, fill, query
//! and (de)serialize handles only through [`IndexBackend`], so any library
//! exposing those operations per variant can be plugged in.

use bytes::Bytes;

use crate::codec::Dataset;
use crate::error::Result;
use crate::index::registry::VariantParams;
use crate::types::{IndexVariant, Neighbors};

/// Build, query and persist index handles for every [`IndexVariant`].
///
/// Methods are synchronous and may be CPU heavy; callers run them on the
/// blocking pool. Handles must be shareable across threads because one
/// resident handle serves concurrent searches.
pub trait IndexBackend: Send + Sync + 'static {
    /// Opaque in-memory index.
    type Handle: Send + Sync + 'static;

    /// Create an empty, untrained index of dimension `dim`.
    ///
    /// Parameter validation (e.g. `dim` divisible by the PQ subvector count)
    /// happens here and fails with `IndexBuild`.
    fn create(&self, params: &VariantParams, dim: usize) -> Result<Self::Handle>;

    /// Training pass for variants whose parameters say
    /// [`VariantParams::requires_training`]. Must run before `add`.
    fn train(&self, handle: &mut Self::Handle, vectors: &Dataset) -> Result<()>;

    /// Append `vectors`; ids continue from the current vector count.
    fn add(&self, handle: &mut Self::Handle, vectors: &Dataset) -> Result<()>;

    /// Up to `k` nearest neighbours of `query`, nearest first.
    fn search(&self, handle: &Self::Handle, query: &[f32], k: usize) -> Result<Neighbors>;

    /// Dimension the handle was created with.
    fn dimension(&self, handle: &Self::Handle) -> usize;

    fn serialize(&self, handle: &Self::Handle) -> Result<Bytes>;

    /// Restore a handle written by [`IndexBackend::serialize`] for `variant`.
    fn deserialize(&self, variant: IndexVariant, data: &[u8]) -> Result<Self::Handle>;

    /// Full build: create, train when required, then add every vector.
    fn build(&self, params: &VariantParams, vectors: &Dataset) -> Result<Self::Handle> {
        let mut handle = self.create(params, vectors.dim())?;
        if params.requires_training() {
            self.train(&mut handle, vectors)?;
        }
        self.add(&mut handle, vectors)?;
        Ok(handle)
    }
}
