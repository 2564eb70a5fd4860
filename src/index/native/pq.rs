//! Product Quantization: split each vector into `m` subvectors and encode
//! every subvector as the id of its nearest centroid in a per-subspace
//! codebook of `2^nbits` entries.
//!
//! Search uses Asymmetric Distance Computation (ADC): one `m x ksub` table
//! of query-to-centroid distances, then `m` lookups per encoded vector.

use serde::{Deserialize, Serialize};

use super::distance::{squared_l2, TopK};
use super::kmeans::train_kmeans;
use crate::codec::Dataset;
use crate::error::{Result, VectorLakeError};
use crate::types::{IndexVariant, Neighbors};

/// Trained per-subspace codebooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PqCodebook {
    pub dim: usize,
    pub m: usize,
    pub nbits: usize,
    pub sub_dim: usize,
    /// `m * ksub * sub_dim` floats; empty until trained.
    centroids: Vec<f32>,
}

impl PqCodebook {
    /// Validate the layout; `variant` is only used for error context.
    pub fn new(variant: IndexVariant, dim: usize, m: usize, nbits: usize) -> Result<Self> {
        let fail = |reason: String| VectorLakeError::IndexBuild { variant, reason };
        if dim == 0 || m == 0 {
            return Err(fail(format!("dim ({dim}) and m ({m}) must be > 0")));
        }
        if dim % m != 0 {
            return Err(fail(format!("dim ({dim}) must be divisible by m ({m})")));
        }
        if !(1..=8).contains(&nbits) {
            return Err(fail(format!("nbits must be in 1..=8, got {nbits}")));
        }
        Ok(Self {
            dim,
            m,
            nbits,
            sub_dim: dim / m,
            centroids: Vec::new(),
        })
    }

    /// Centroids per subspace.
    pub fn ksub(&self) -> usize {
        1 << self.nbits
    }

    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Train every subspace codebook with k-means.
    pub fn train(&mut self, points: &[&[f32]], kmeans_iters: usize, kmeans_epsilon: f64) {
        let ksub = self.ksub();
        let mut centroids = Vec::with_capacity(self.m * ksub * self.sub_dim);
        for sub in 0..self.m {
            let offset = sub * self.sub_dim;
            let sub_points: Vec<&[f32]> = points
                .iter()
                .map(|p| &p[offset..offset + self.sub_dim])
                .collect();
            let mut trained = train_kmeans(&sub_points, self.sub_dim, ksub, kmeans_iters, kmeans_epsilon);
            // Fewer points than ksub: pad by repeating the last centroid so
            // every code stays addressable.
            let have = trained.len() / self.sub_dim;
            if have < ksub {
                let last = trained[(have - 1) * self.sub_dim..].to_vec();
                for _ in have..ksub {
                    trained.extend_from_slice(&last);
                }
            }
            centroids.extend(trained);
        }
        self.centroids = centroids;
    }

    fn centroid(&self, sub: usize, code: usize) -> &[f32] {
        let start = (sub * self.ksub() + code) * self.sub_dim;
        &self.centroids[start..start + self.sub_dim]
    }

    /// Encode one vector to `m` codes.
    pub fn encode(&self, v: &[f32], out: &mut Vec<u8>) {
        debug_assert_eq!(v.len(), self.dim);
        for sub in 0..self.m {
            let sv = &v[sub * self.sub_dim..(sub + 1) * self.sub_dim];
            let mut best = (0usize, f32::MAX);
            for code in 0..self.ksub() {
                let d = squared_l2(sv, self.centroid(sub, code));
                if d < best.1 {
                    best = (code, d);
                }
            }
            out.push(best.0 as u8);
        }
    }

    /// ADC table: `table[sub * ksub + code]`.
    pub fn adc_table(&self, query: &[f32]) -> Vec<f32> {
        let ksub = self.ksub();
        let mut table = Vec::with_capacity(self.m * ksub);
        for sub in 0..self.m {
            let q = &query[sub * self.sub_dim..(sub + 1) * self.sub_dim];
            for code in 0..ksub {
                table.push(squared_l2(q, self.centroid(sub, code)));
            }
        }
        table
    }

    #[inline]
    pub fn adc_distance(&self, table: &[f32], codes: &[u8]) -> f32 {
        let ksub = self.ksub();
        codes
            .iter()
            .enumerate()
            .map(|(sub, &c)| table[sub * ksub + c as usize])
            .sum()
    }
}

/// Flat list of PQ codes over one codebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PqIndex {
    pub(crate) codebook: PqCodebook,
    kmeans_iterations: usize,
    kmeans_epsilon: f64,
    /// `count * m` codes.
    codes: Vec<u8>,
    count: usize,
}

impl PqIndex {
    pub fn new(dim: usize, m: usize, nbits: usize, kmeans_iterations: usize, kmeans_epsilon: f64) -> Result<Self> {
        Ok(Self {
            codebook: PqCodebook::new(IndexVariant::Pq, dim, m, nbits)?,
            kmeans_iterations,
            kmeans_epsilon,
            codes: Vec::new(),
            count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn train(&mut self, vectors: &Dataset) -> Result<()> {
        if vectors.is_empty() {
            return Err(VectorLakeError::IndexBuild {
                variant: IndexVariant::Pq,
                reason: "cannot train on an empty dataset".into(),
            });
        }
        let points: Vec<&[f32]> = vectors.rows().collect();
        self.codebook.train(&points, self.kmeans_iterations, self.kmeans_epsilon);
        Ok(())
    }

    pub fn add(&mut self, vectors: &Dataset) -> Result<()> {
        if !self.codebook.is_trained() {
            return Err(VectorLakeError::IndexBuild {
                variant: IndexVariant::Pq,
                reason: "index must be trained before adding vectors".into(),
            });
        }
        self.codes.reserve(vectors.len() * self.codebook.m);
        for v in vectors.rows() {
            self.codebook.encode(v, &mut self.codes);
        }
        self.count += vectors.len();
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Neighbors {
        let mut top = TopK::new(k);
        if !self.codebook.is_trained() {
            return top.into_neighbors();
        }
        let table = self.codebook.adc_table(query);
        for (id, codes) in self.codes.chunks_exact(self.codebook.m).enumerate() {
            top.push(self.codebook.adc_distance(&table, codes), id as u64);
        }
        top.into_neighbors()
    }
}
