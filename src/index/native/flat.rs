use serde::{Deserialize, Serialize};

use super::distance::{squared_l2, TopK};
use crate::codec::Dataset;
use crate::types::Neighbors;

/// Exact index: stores every vector and scans all of them per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dim: usize,
    values: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.values.len() / self.dim
        }
    }

    pub fn add(&mut self, vectors: &Dataset) {
        self.values.extend_from_slice(vectors.as_slice());
    }

    pub fn search(&self, query: &[f32], k: usize) -> Neighbors {
        let mut top = TopK::new(k);
        if self.dim == 0 {
            return top.into_neighbors();
        }
        for (id, v) in self.values.chunks_exact(self.dim).enumerate() {
            top.push(squared_l2(query, v), id as u64);
        }
        top.into_neighbors()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_ranking() {
        let data = Dataset::from_rows(&[[0.0f32, 0.0], [1.0, 0.0], [3.0, 0.0], [0.0, 2.0]]).unwrap();
        let mut index = FlatIndex::new(2);
        index.add(&data);
        assert_eq!(index.len(), 4);

        let result = index.search(&[0.9, 0.0], 3);
        assert_eq!(result.ids, vec![1, 0, 2]);
        assert!((result.distances[0] - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_count() {
        let data = Dataset::from_rows(&[[1.0f32], [2.0]]).unwrap();
        let mut index = FlatIndex::new(1);
        index.add(&data);
        assert_eq!(index.search(&[0.0], 100).len(), 2);
    }
}
