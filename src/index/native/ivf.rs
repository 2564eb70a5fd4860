//! Inverted-file indexes.
//!
//! A coarse k-means quantizer partitions the space into `nlist` cells; each
//! vector is stored in the posting list of its nearest centroid. Search
//! ranks centroids against the query and scans the `nprobe` closest lists.
//!
//! `IvfFlatIndex` keeps full vectors in each list. `IvfPqIndex` keeps PQ
//! codes of the residual `v - centroid`, scored with ADC on
//! `query - centroid`.

use serde::{Deserialize, Serialize};

use super::distance::{squared_l2, TopK};
use super::kmeans::{nearest, nearest_n, train_kmeans};
use super::pq::PqCodebook;
use crate::codec::Dataset;
use crate::error::{Result, VectorLakeError};
use crate::types::{IndexVariant, Neighbors};

/// Coarse quantizer shared by both IVF variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CoarseQuantizer {
    dim: usize,
    nlist: usize,
    nprobe: usize,
    kmeans_iterations: usize,
    kmeans_epsilon: f64,
    /// `nlist_trained * dim` floats; empty until trained.
    centroids: Vec<f32>,
}

impl CoarseQuantizer {
    fn new(variant: IndexVariant, dim: usize, nlist: usize, nprobe: usize, kmeans_iterations: usize, kmeans_epsilon: f64) -> Result<Self> {
        if dim == 0 || nlist == 0 {
            return Err(VectorLakeError::IndexBuild {
                variant,
                reason: format!("dim ({dim}) and nlist ({nlist}) must be > 0"),
            });
        }
        Ok(Self {
            dim,
            nlist,
            nprobe: nprobe.clamp(1, nlist),
            kmeans_iterations,
            kmeans_epsilon,
            centroids: Vec::new(),
        })
    }

    fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Number of trained lists; below `nlist` when the training set was smaller.
    fn lists(&self) -> usize {
        self.centroids.len() / self.dim
    }

    fn train(&mut self, points: &[&[f32]]) {
        self.centroids = train_kmeans(points, self.dim, self.nlist, self.kmeans_iterations, self.kmeans_epsilon);
    }

    fn centroid(&self, list: usize) -> &[f32] {
        &self.centroids[list * self.dim..(list + 1) * self.dim]
    }

    fn assign(&self, v: &[f32]) -> usize {
        nearest(&self.centroids, self.dim, v).0
    }

    fn set_nprobe(&mut self, nprobe: usize) {
        self.nprobe = nprobe.clamp(1, self.nlist);
    }

    fn probe(&self, query: &[f32]) -> Vec<usize> {
        nearest_n(&self.centroids, self.dim, query, self.nprobe)
    }
}

fn untrained(variant: IndexVariant) -> VectorLakeError {
    VectorLakeError::IndexBuild {
        variant,
        reason: "index must be trained before adding vectors".into(),
    }
}

fn empty_training_set(variant: IndexVariant) -> VectorLakeError {
    VectorLakeError::IndexBuild {
        variant,
        reason: "cannot train on an empty dataset".into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfFlatIndex {
    quantizer: CoarseQuantizer,
    /// Per-list vector ids.
    ids: Vec<Vec<u64>>,
    /// Per-list row-major vectors, parallel to `ids`.
    vectors: Vec<Vec<f32>>,
    count: usize,
}

impl IvfFlatIndex {
    pub fn new(dim: usize, nlist: usize, nprobe: usize, kmeans_iterations: usize, kmeans_epsilon: f64) -> Result<Self> {
        Ok(Self {
            quantizer: CoarseQuantizer::new(IndexVariant::IvfFlat, dim, nlist, nprobe, kmeans_iterations, kmeans_epsilon)?,
            ids: Vec::new(),
            vectors: Vec::new(),
            count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Change how many lists a search scans, clamped to `1..=nlist`.
    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.quantizer.set_nprobe(nprobe);
    }

    pub fn train(&mut self, vectors: &Dataset) -> Result<()> {
        if vectors.is_empty() {
            return Err(empty_training_set(IndexVariant::IvfFlat));
        }
        let points: Vec<&[f32]> = vectors.rows().collect();
        self.quantizer.train(&points);
        let lists = self.quantizer.lists();
        self.ids = vec![Vec::new(); lists];
        self.vectors = vec![Vec::new(); lists];
        Ok(())
    }

    pub fn add(&mut self, vectors: &Dataset) -> Result<()> {
        if !self.quantizer.is_trained() {
            return Err(untrained(IndexVariant::IvfFlat));
        }
        for (offset, v) in vectors.rows().enumerate() {
            let list = self.quantizer.assign(v);
            self.ids[list].push((self.count + offset) as u64);
            self.vectors[list].extend_from_slice(v);
        }
        self.count += vectors.len();
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Neighbors {
        let mut top = TopK::new(k);
        if !self.quantizer.is_trained() {
            return top.into_neighbors();
        }
        let dim = self.quantizer.dim;
        for list in self.quantizer.probe(query) {
            for (&id, v) in self.ids[list].iter().zip(self.vectors[list].chunks_exact(dim)) {
                top.push(squared_l2(query, v), id);
            }
        }
        top.into_neighbors()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfPqIndex {
    quantizer: CoarseQuantizer,
    codebook: PqCodebook,
    ids: Vec<Vec<u64>>,
    /// Per-list residual codes, `m` bytes per vector.
    codes: Vec<Vec<u8>>,
    count: usize,
}

impl IvfPqIndex {
    pub fn new(
        dim: usize,
        nlist: usize,
        nprobe: usize,
        m: usize,
        nbits: usize,
        kmeans_iterations: usize,
        kmeans_epsilon: f64,
    ) -> Result<Self> {
        Ok(Self {
            quantizer: CoarseQuantizer::new(IndexVariant::IvfPq, dim, nlist, nprobe, kmeans_iterations, kmeans_epsilon)?,
            codebook: PqCodebook::new(IndexVariant::IvfPq, dim, m, nbits)?,
            ids: Vec::new(),
            codes: Vec::new(),
            count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    fn residual(&self, v: &[f32], list: usize) -> Vec<f32> {
        v.iter()
            .zip(self.quantizer.centroid(list))
            .map(|(x, c)| x - c)
            .collect()
    }

    pub fn train(&mut self, vectors: &Dataset) -> Result<()> {
        if vectors.is_empty() {
            return Err(empty_training_set(IndexVariant::IvfPq));
        }
        let points: Vec<&[f32]> = vectors.rows().collect();
        self.quantizer.train(&points);

        let residuals: Vec<Vec<f32>> = points
            .iter()
            .map(|p| self.residual(p, self.quantizer.assign(p)))
            .collect();
        let refs: Vec<&[f32]> = residuals.iter().map(Vec::as_slice).collect();
        self.codebook.train(&refs, self.quantizer.kmeans_iterations, self.quantizer.kmeans_epsilon);

        let lists = self.quantizer.lists();
        self.ids = vec![Vec::new(); lists];
        self.codes = vec![Vec::new(); lists];
        Ok(())
    }

    pub fn add(&mut self, vectors: &Dataset) -> Result<()> {
        if !self.quantizer.is_trained() || !self.codebook.is_trained() {
            return Err(untrained(IndexVariant::IvfPq));
        }
        for (offset, v) in vectors.rows().enumerate() {
            let list = self.quantizer.assign(v);
            let residual = self.residual(v, list);
            self.ids[list].push((self.count + offset) as u64);
            self.codebook.encode(&residual, &mut self.codes[list]);
        }
        self.count += vectors.len();
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Neighbors {
        let mut top = TopK::new(k);
        if !self.quantizer.is_trained() || !self.codebook.is_trained() {
            return top.into_neighbors();
        }
        for list in self.quantizer.probe(query) {
            let table = self.codebook.adc_table(&self.residual(query, list));
            for (&id, codes) in self.ids[list].iter().zip(self.codes[list].chunks_exact(self.codebook.m)) {
                top.push(self.codebook.adc_distance(&table, codes), id);
            }
        }
        top.into_neighbors()
    }
}
