//! Distance kernels and bounded top-k selection.
//!
//! All distances are "lower is closer" so results can be ranked ascending.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::Neighbors;

/// Squared Euclidean distance: `sum((a_i - b_i)^2)`.
///
/// Squared to skip the sqrt; ordering is preserved.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");

    // Chunks of 8 so LLVM can auto-vectorize the inner loop.
    let chunks = a.len() / 8;
    let mut acc = [0.0f32; 8];
    for i in 0..chunks {
        let base = i * 8;
        for j in 0..8 {
            let d = a[base + j] - b[base + j];
            acc[j] += d * d;
        }
    }
    let mut sum: f32 = acc.iter().sum();
    for i in chunks * 8..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Number of differing bits between two packed binary codes.
#[inline]
pub fn hamming(a: &[u64], b: &[u64]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// A scored candidate, ordered by distance then id.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scored {
    pub dist: f32,
    pub id: u64,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Keeps the `k` smallest candidates seen so far (max-heap on distance).
pub(crate) struct TopK {
    k: usize,
    heap: BinaryHeap<Scored>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
        }
    }

    #[inline]
    pub fn push(&mut self, dist: f32, id: u64) {
        if self.k == 0 {
            return;
        }
        let cand = Scored { dist, id };
        if self.heap.len() < self.k {
            self.heap.push(cand);
        } else if let Some(worst) = self.heap.peek() {
            if cand < *worst {
                self.heap.pop();
                self.heap.push(cand);
            }
        }
    }

    pub fn into_neighbors(self) -> Neighbors {
        let sorted = self.heap.into_sorted_vec();
        let mut out = Neighbors {
            distances: Vec::with_capacity(sorted.len()),
            ids: Vec::with_capacity(sorted.len()),
        };
        for s in sorted {
            out.distances.push(s.dist);
            out.ids.push(s.id);
        }
        out
    }
}
