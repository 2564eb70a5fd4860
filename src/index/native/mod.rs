//! Pure-Rust implementation of every index variant.
//!
//! Serialized layout:
//!
//! ```text
//! [magic "VLIX"][version: u32 LE][variant tag: u8][bincode body]
//! ```

pub mod distance;
pub mod flat;
pub mod hnsw;
pub mod ivf;
pub mod kmeans;
pub mod lsh;
pub mod pq;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::Dataset;
use crate::config::IndexingConfig;
use crate::error::{Result, VectorLakeError};
use crate::index::backend::IndexBackend;
use crate::index::registry::VariantParams;
use crate::types::{IndexVariant, Neighbors};

use flat::FlatIndex;
use hnsw::HnswIndex;
use ivf::{IvfFlatIndex, IvfPqIndex};
use lsh::LshIndex;
use pq::PqIndex;

const MAGIC: &[u8; 4] = b"VLIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 9;

/// One in-memory index of any variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NativeIndex {
    Flat(FlatIndex),
    Lsh(LshIndex),
    Hnsw(HnswIndex),
    IvfFlat(IvfFlatIndex),
    Pq(PqIndex),
    IvfPq(IvfPqIndex),
}

impl NativeIndex {
    pub fn variant(&self) -> IndexVariant {
        match self {
            NativeIndex::Flat(_) => IndexVariant::Flat,
            NativeIndex::Lsh(_) => IndexVariant::Lsh,
            NativeIndex::Hnsw(_) => IndexVariant::Hnsw,
            NativeIndex::IvfFlat(_) => IndexVariant::IvfFlat,
            NativeIndex::Pq(_) => IndexVariant::Pq,
            NativeIndex::IvfPq(_) => IndexVariant::IvfPq,
        }
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        match self {
            NativeIndex::Flat(i) => i.len(),
            NativeIndex::Lsh(i) => i.len(),
            NativeIndex::Hnsw(i) => i.len(),
            NativeIndex::IvfFlat(i) => i.len(),
            NativeIndex::Pq(i) => i.len(),
            NativeIndex::IvfPq(i) => i.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A handle plus the dimension it was created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeHandle {
    dim: usize,
    index: NativeIndex,
}

impl NativeHandle {
    pub fn index(&self) -> &NativeIndex {
        &self.index
    }
}

/// The default [`IndexBackend`].
#[derive(Debug, Clone)]
pub struct NativeBackend {
    kmeans_epsilon: f64,
}

impl NativeBackend {
    pub fn new(kmeans_epsilon: f64) -> Self {
        Self { kmeans_epsilon }
    }

    pub fn from_config(config: &IndexingConfig) -> Self {
        Self::new(config.kmeans_convergence_epsilon)
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::from_config(&IndexingConfig::default())
    }
}

impl IndexBackend for NativeBackend {
    type Handle = NativeHandle;

    fn create(&self, params: &VariantParams, dim: usize) -> Result<NativeHandle> {
        let eps = self.kmeans_epsilon;
        let index = match *params {
            VariantParams::Flat => NativeIndex::Flat(FlatIndex::new(dim)),
            VariantParams::Lsh { bits_per_dimension } => NativeIndex::Lsh(LshIndex::new(dim, bits_per_dimension)?),
            VariantParams::Hnsw {
                m,
                ef_search,
                ef_construction,
            } => NativeIndex::Hnsw(HnswIndex::new(dim, m, ef_search, ef_construction)?),
            VariantParams::IvfFlat {
                nlist,
                nprobe,
                kmeans_iterations,
            } => NativeIndex::IvfFlat(IvfFlatIndex::new(dim, nlist, nprobe, kmeans_iterations, eps)?),
            VariantParams::Pq {
                m,
                nbits,
                kmeans_iterations,
            } => NativeIndex::Pq(PqIndex::new(dim, m, nbits, kmeans_iterations, eps)?),
            VariantParams::IvfPq {
                nlist,
                nprobe,
                m,
                nbits,
                kmeans_iterations,
            } => NativeIndex::IvfPq(IvfPqIndex::new(dim, nlist, nprobe, m, nbits, kmeans_iterations, eps)?),
        };
        Ok(NativeHandle { dim, index })
    }

    fn train(&self, handle: &mut NativeHandle, vectors: &Dataset) -> Result<()> {
        check_dim(handle, vectors)?;
        match &mut handle.index {
            NativeIndex::IvfFlat(i) => i.train(vectors),
            NativeIndex::Pq(i) => i.train(vectors),
            NativeIndex::IvfPq(i) => i.train(vectors),
            NativeIndex::Flat(_) | NativeIndex::Lsh(_) | NativeIndex::Hnsw(_) => Ok(()),
        }
    }

    fn add(&self, handle: &mut NativeHandle, vectors: &Dataset) -> Result<()> {
        check_dim(handle, vectors)?;
        match &mut handle.index {
            NativeIndex::Flat(i) => {
                i.add(vectors);
                Ok(())
            }
            NativeIndex::Lsh(i) => {
                i.add(vectors);
                Ok(())
            }
            NativeIndex::Hnsw(i) => i.add(vectors),
            NativeIndex::IvfFlat(i) => i.add(vectors),
            NativeIndex::Pq(i) => i.add(vectors),
            NativeIndex::IvfPq(i) => i.add(vectors),
        }
    }

    fn search(&self, handle: &NativeHandle, query: &[f32], k: usize) -> Result<Neighbors> {
        if query.len() != handle.dim {
            return Err(VectorLakeError::DimensionMismatch {
                expected: handle.dim,
                actual: query.len(),
            });
        }
        Ok(match &handle.index {
            NativeIndex::Flat(i) => i.search(query, k),
            NativeIndex::Lsh(i) => i.search(query, k),
            NativeIndex::Hnsw(i) => i.search(query, k),
            NativeIndex::IvfFlat(i) => i.search(query, k),
            NativeIndex::Pq(i) => i.search(query, k),
            NativeIndex::IvfPq(i) => i.search(query, k),
        })
    }

    fn dimension(&self, handle: &NativeHandle) -> usize {
        handle.dim
    }

    fn serialize(&self, handle: &NativeHandle) -> Result<Bytes> {
        let body = bincode::serialize(handle)?;
        let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.push(handle.index.variant().tag());
        buf.extend_from_slice(&body);
        Ok(Bytes::from(buf))
    }

    fn deserialize(&self, variant: IndexVariant, data: &[u8]) -> Result<NativeHandle> {
        if data.len() < HEADER_LEN || &data[..4] != MAGIC {
            return Err(VectorLakeError::Format(format!(
                "{variant} artifact is not a native index (bad magic)"
            )));
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != FORMAT_VERSION {
            return Err(VectorLakeError::Format(format!(
                "unsupported native index version {version}, expected {FORMAT_VERSION}"
            )));
        }
        match IndexVariant::from_tag(data[8]) {
            Some(found) if found == variant => {}
            found => {
                return Err(VectorLakeError::Format(format!(
                    "artifact holds {} index, expected {variant}",
                    found.map_or_else(|| format!("unknown (tag {})", data[8]), |v| v.to_string())
                )))
            }
        }

        let handle: NativeHandle = bincode::deserialize(&data[HEADER_LEN..])?;
        if handle.index.variant() != variant {
            return Err(VectorLakeError::Format(format!(
                "artifact body holds {} index, expected {variant}",
                handle.index.variant()
            )));
        }
        Ok(handle)
    }
}

fn check_dim(handle: &NativeHandle, vectors: &Dataset) -> Result<()> {
    if !vectors.is_empty() && vectors.dim() != handle.dim {
        return Err(VectorLakeError::DimensionMismatch {
            expected: handle.dim,
            actual: vectors.dim(),
        });
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::registry::IndexRegistry;
    use rand::Rng;

    fn random_dataset(n: usize, dim: usize) -> Dataset {
        let mut rng = rand::thread_rng();
        let values = (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Dataset::new(dim, values).unwrap()
    }

    fn small_registry() -> IndexRegistry {
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

    #[test]
    fn test_every_variant_builds_and_searches() {
        let backend = NativeBackend::default();
        let registry = small_registry();
        let data = random_dataset(300, 16);

        for variant in IndexVariant::ALL {
            let handle = backend.build(registry.params(variant), &data).unwrap();
            assert_eq!(backend.dimension(&handle), 16);
            assert_eq!(handle.index().len(), 300, "{variant}");

            let result = backend.search(&handle, data.row(7), 10).unwrap();
            assert_eq!(result.len(), 10, "{variant}");
            assert!(result.distances.windows(2).all(|w| w[0] <= w[1]), "{variant}");
        }
    }

    #[test]
    fn test_serialize_roundtrip_preserves_results() {
        let backend = NativeBackend::default();
        let registry = small_registry();
        let data = random_dataset(200, 16);

        for variant in [IndexVariant::Flat, IndexVariant::Lsh, IndexVariant::IvfPq] {
            let handle = backend.build(registry.params(variant), &data).unwrap();
            let bytes = backend.serialize(&handle).unwrap();
            assert_eq!(&bytes[..4], MAGIC);

            let restored = backend.deserialize(variant, &bytes).unwrap();
            let before = backend.search(&handle, data.row(3), 5).unwrap();
            let after = backend.search(&restored, data.row(3), 5).unwrap();
            assert_eq!(before, after, "{variant}");
        }
    }

    #[test]
    fn test_deserialize_rejects_wrong_variant() {
        let backend = NativeBackend::default();
        let handle = backend
            .build(&VariantParams::Flat, &random_dataset(10, 4))
            .unwrap();
        let bytes = backend.serialize(&handle).unwrap();
        assert!(matches!(
            backend.deserialize(IndexVariant::Hnsw, &bytes),
            Err(VectorLakeError::Format(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let backend = NativeBackend::default();
        assert!(matches!(
            backend.deserialize(IndexVariant::Flat, b"not an index"),
            Err(VectorLakeError::Format(_))
        ));
        assert!(backend.deserialize(IndexVariant::Flat, &[]).is_err());
    }

    #[test]
    fn test_query_dimension_checked() {
        let backend = NativeBackend::default();
        let handle = backend
            .build(&VariantParams::Flat, &random_dataset(10, 4))
            .unwrap();
        match backend.search(&handle, &[0.0; 3], 1) {
            Err(VectorLakeError::DimensionMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (4, 3));
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_pq_layout_error_surfaces_from_create() {
        let backend = NativeBackend::default();
        let params = VariantParams::Pq {
            m: 3,
            nbits: 8,
            kmeans_iterations: 5,
        };
        assert!(matches!(
            backend.create(&params, 16),
            Err(VectorLakeError::IndexBuild { variant: IndexVariant::Pq, .. })
        ));
    }
}
