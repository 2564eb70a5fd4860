//! Static build parameters, one record per index variant.

use serde::{Deserialize, Serialize};

use crate::config::IndexingConfig;
use crate::types::IndexVariant;

/// Build parameters for one variant. Fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum VariantParams {
    Flat,
    Lsh {
        /// Hash bits per input dimension; the index uses `dim * this` bits.
        bits_per_dimension: usize,
    },
    Hnsw {
        /// Graph degree.
        m: usize,
        ef_search: usize,
        ef_construction: usize,
    },
    IvfFlat {
        nlist: usize,
        nprobe: usize,
        kmeans_iterations: usize,
    },
    Pq {
        /// Number of subvectors; must divide the dimension.
        m: usize,
        nbits: usize,
        kmeans_iterations: usize,
    },
    IvfPq {
        nlist: usize,
        nprobe: usize,
        m: usize,
        nbits: usize,
        kmeans_iterations: usize,
    },
}

impl VariantParams {
    pub fn variant(&self) -> IndexVariant {
        match self {
            VariantParams::Flat => IndexVariant::Flat,
            VariantParams::Lsh { .. } => IndexVariant::Lsh,
            VariantParams::Hnsw { .. } => IndexVariant::Hnsw,
            VariantParams::IvfFlat { .. } => IndexVariant::IvfFlat,
            VariantParams::Pq { .. } => IndexVariant::Pq,
            VariantParams::IvfPq { .. } => IndexVariant::IvfPq,
        }
    }

    /// Whether a training pass over the data must precede `add`.
    pub fn requires_training(&self) -> bool {
        match self {
            VariantParams::Flat | VariantParams::Lsh { .. } | VariantParams::Hnsw { .. } => false,
            VariantParams::IvfFlat { .. } | VariantParams::Pq { .. } | VariantParams::IvfPq { .. } => {
                true
            }
        }
    }
}

/// The supported variants and their parameter records.
#[derive(Debug, Clone)]
pub struct IndexRegistry {
    params: [VariantParams; 6],
}

impl IndexRegistry {
    pub fn from_config(config: &IndexingConfig) -> Self {
        let iters = config.kmeans_max_iterations;
        let params = IndexVariant::ALL.map(|variant| match variant {
            IndexVariant::Flat => VariantParams::Flat,
            IndexVariant::Lsh => VariantParams::Lsh {
                bits_per_dimension: config.lsh_bits_per_dimension,
            },
            IndexVariant::Hnsw => VariantParams::Hnsw {
                m: config.hnsw_m,
                ef_search: config.hnsw_ef_search,
                ef_construction: config.hnsw_ef_construction,
            },
            IndexVariant::IvfFlat => VariantParams::IvfFlat {
                nlist: config.ivf_nlist,
                nprobe: config.ivf_nprobe,
                kmeans_iterations: iters,
            },
            IndexVariant::Pq => VariantParams::Pq {
                m: config.pq_m,
                nbits: config.pq_nbits,
                kmeans_iterations: iters,
            },
            IndexVariant::IvfPq => VariantParams::IvfPq {
                nlist: config.ivf_nlist,
                nprobe: config.ivf_nprobe,
                m: config.ivfpq_m,
                nbits: config.ivfpq_nbits,
                kmeans_iterations: iters,
            },
        });
        Self { params }
    }

    pub fn params(&self, variant: IndexVariant) -> &VariantParams {
        &self.params[variant.slot()]
    }

    pub fn variants(&self) -> impl Iterator<Item = IndexVariant> + '_ {
        self.params.iter().map(VariantParams::variant)
    }
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::from_config(&IndexingConfig::default())
    }
}
