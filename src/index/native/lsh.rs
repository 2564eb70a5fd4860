//! Random-hyperplane LSH: each vector becomes a bit string whose `i`-th bit
//! is the sign of its projection onto hyperplane `i`. Ranking is by Hamming
//! distance between codes.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distance::{hamming, TopK};
use crate::codec::Dataset;
use crate::error::{Result, VectorLakeError};
use crate::types::{IndexVariant, Neighbors};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LshIndex {
    dim: usize,
    nbits: usize,
    /// `nbits * dim` projection weights.
    planes: Vec<f32>,
    /// Packed codes, `words()` u64 per vector.
    codes: Vec<u64>,
    count: usize,
}

impl LshIndex {
    pub fn new(dim: usize, bits_per_dimension: usize) -> Result<Self> {
        let nbits = dim * bits_per_dimension;
        if nbits == 0 {
            return Err(VectorLakeError::IndexBuild {
                variant: IndexVariant::Lsh,
                reason: format!("need at least one hash bit (dim {dim}, bits/dim {bits_per_dimension})"),
            });
        }
        let mut rng = rand::thread_rng();
        let planes = (0..nbits * dim).map(|_| gaussian(&mut rng)).collect();
        Ok(Self {
            dim,
            nbits,
            planes,
            codes: Vec::new(),
            count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    fn words(&self) -> usize {
        self.nbits.div_ceil(64)
    }

    fn hash(&self, v: &[f32]) -> Vec<u64> {
        let mut code = vec![0u64; self.words()];
        for (bit, plane) in self.planes.chunks_exact(self.dim).enumerate() {
            let proj: f32 = plane.iter().zip(v).map(|(p, x)| p * x).sum();
            if proj > 0.0 {
                code[bit / 64] |= 1u64 << (bit % 64);
            }
        }
        code
    }

    pub fn add(&mut self, vectors: &Dataset) {
        self.codes.reserve(vectors.len() * self.words());
        for v in vectors.rows() {
            let code = self.hash(v);
            self.codes.extend_from_slice(&code);
        }
        self.count += vectors.len();
    }

    pub fn search(&self, query: &[f32], k: usize) -> Neighbors {
        let q = self.hash(query);
        let mut top = TopK::new(k);
        for (id, code) in self.codes.chunks_exact(self.words()).enumerate() {
            top.push(hamming(&q, code) as f32, id as u64);
        }
        top.into_neighbors()
    }
}

/// Standard normal sample (Box-Muller), so hyperplane normals are isotropic.
fn gaussian<R: Rng>(rng: &mut R) -> f32 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vector_has_zero_distance() {
        let data = Dataset::from_rows(&[[1.0f32, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [-1.0, 0.0, 0.0, 0.0]])
            .unwrap();
        let mut index = LshIndex::new(4, 8).unwrap();
        index.add(&data);
        assert_eq!(index.len(), 3);

        let result = index.search(&[1.0, 0.0, 0.0, 0.0], 3);
        assert_eq!(result.distances[0], 0.0);
        assert_eq!(result.ids[0], 0);
        // The opposite vector flips every bit.
        assert_eq!(result.ids[2], 2);
        assert_eq!(result.distances[2], 32.0);
    }

    #[test]
    fn test_code_width() {
        let index = LshIndex::new(10, 8).unwrap();
        assert_eq!(index.nbits, 80);
        assert_eq!(index.words(), 2);
    }

    #[test]
    fn test_zero_bits_rejected() {
        assert!(LshIndex::new(4, 0).is_err());
    }
}
