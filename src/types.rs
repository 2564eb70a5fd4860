use serde::{Deserialize, Serialize};

use crate::error::VectorLakeError;

/// Index construction strategy. The set is closed: every variant has exactly
/// one cache slot and one static parameter record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IndexVariant {
    /// Exact brute-force scan.
    #[default]
    Flat,
    /// Random-hyperplane locality sensitive hashing.
    Lsh,
    /// Hierarchical navigable small world graph.
    Hnsw,
    /// Inverted file with flat (uncompressed) vectors.
    IvfFlat,
    /// Product quantization.
    Pq,
    /// Inverted file with product-quantized vectors.
    IvfPq,
}

impl IndexVariant {
    /// Every variant, in slot order.
    pub const ALL: [IndexVariant; 6] = [
        IndexVariant::Flat,
        IndexVariant::Lsh,
        IndexVariant::Hnsw,
        IndexVariant::IvfFlat,
        IndexVariant::Pq,
        IndexVariant::IvfPq,
    ];

    /// Stable lowercase name used in artifact file names and logs.
    pub fn name(self) -> &'static str {
        match self {
            IndexVariant::Flat => "flat",
            IndexVariant::Lsh => "lsh",
            IndexVariant::Hnsw => "hnsw",
            IndexVariant::IvfFlat => "ivfflat",
            IndexVariant::Pq => "pq",
            IndexVariant::IvfPq => "ivfpq",
        }
    }

    /// Position of this variant's slot in per-variant arrays.
    pub fn slot(self) -> usize {
        match self {
            IndexVariant::Flat => 0,
            IndexVariant::Lsh => 1,
            IndexVariant::Hnsw => 2,
            IndexVariant::IvfFlat => 3,
            IndexVariant::Pq => 4,
            IndexVariant::IvfPq => 5,
        }
    }

    /// Wire tag stored in serialized native index headers.
    pub(crate) fn tag(self) -> u8 {
        self.slot() as u8
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

impl std::fmt::Display for IndexVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for IndexVariant {
    type Err = VectorLakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        IndexVariant::ALL
            .into_iter()
            .find(|v| v.name() == normalized)
            .ok_or_else(|| VectorLakeError::UnsupportedVariant(s.to_string()))
    }
}

/// Nearest neighbours for one query, nearest first.
///
/// `distances[i]` belongs to `ids[i]`; ids are row positions in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Neighbors {
    pub distances: Vec<f32>,
    pub ids: Vec<u64>,
}

impl Neighbors {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate `(distance, id)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f32, u64)> + '_ {
        self.distances.iter().copied().zip(self.ids.iter().copied())
    }
}
