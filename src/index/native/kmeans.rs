//! k-means++ seeding and Lloyd iterations for IVF and PQ training.
//!
//! Centroids are stored flat (`k * dim` floats) and the accumulation buffer
//! is reused across iterations.

use rand::Rng;
use tracing::{debug, warn};

use super::distance::squared_l2;

/// Train up to `k` centroids over `points` (each of length `dim`).
///
/// Returns `min(k, points.len()) * dim` floats; empty when there are no
/// points or `k == 0`. Hitting `max_iters` without converging is not an
/// error, the current centroids are still usable.
pub fn train_kmeans(points: &[&[f32]], dim: usize, k: usize, max_iters: usize, epsilon: f64) -> Vec<f32> {
    let n = points.len();
    if n == 0 || k == 0 || dim == 0 {
        return Vec::new();
    }

    let k = k.min(n);
    let mut centroids = seed_plus_plus(points, dim, k);
    let mut sums = vec![0.0f32; k * dim];
    let mut counts = vec![0usize; k];

    for iter in 0..max_iters {
        sums.iter_mut().for_each(|v| *v = 0.0);
        counts.iter_mut().for_each(|c| *c = 0);

        for p in points {
            let c = nearest(&centroids, dim, p).0;
            counts[c] += 1;
            for (s, v) in sums[c * dim..(c + 1) * dim].iter_mut().zip(p.iter()) {
                *s += v;
            }
        }

        let mut max_shift: f64 = 0.0;
        for c in 0..k {
            let current = &mut centroids[c * dim..(c + 1) * dim];
            // Empty cluster keeps its previous centroid.
            if counts[c] == 0 {
                continue;
            }
            let inv = 1.0 / counts[c] as f32;
            let mean = &mut sums[c * dim..(c + 1) * dim];
            mean.iter_mut().for_each(|v| *v *= inv);
            max_shift = max_shift.max(squared_l2(current, mean) as f64);
            current.copy_from_slice(mean);
        }

        debug!(iter = iter + 1, max_shift, "k-means iteration");
        if max_shift < epsilon {
            return centroids;
        }
    }

    debug!(max_iters, k, "k-means stopped at iteration limit");
    centroids
}

/// Index and squared distance of the centroid nearest to `v`.
#[inline]
pub fn nearest(centroids: &[f32], dim: usize, v: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::MAX);
    for (c, centroid) in centroids.chunks_exact(dim).enumerate() {
        let d = squared_l2(v, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

/// The `n` centroids nearest to `v`, closest first.
pub fn nearest_n(centroids: &[f32], dim: usize, v: &[f32], n: usize) -> Vec<usize> {
    let mut scored: Vec<(f32, usize)> = centroids
        .chunks_exact(dim)
        .enumerate()
        .map(|(c, centroid)| (squared_l2(v, centroid), c))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().take(n).map(|(_, c)| c).collect()
}

/// k-means++: each next seed is drawn with probability proportional to its
/// squared distance from the nearest seed chosen so far.
fn seed_plus_plus(points: &[&[f32]], dim: usize, k: usize) -> Vec<f32> {
    let n = points.len();
    let mut rng = rand::thread_rng();
    let mut centroids = Vec::with_capacity(k * dim);
    centroids.extend_from_slice(points[rng.gen_range(0..n)]);

    let mut min_dists = vec![f32::MAX; n];
    for c in 1..k {
        let last = &centroids[(c - 1) * dim..c * dim];
        let mut total: f64 = 0.0;
        for (i, p) in points.iter().enumerate() {
            min_dists[i] = min_dists[i].min(squared_l2(p, last));
            total += min_dists[i] as f64;
        }

        if total <= 0.0 {
            warn!(chosen = c, k, "all points coincide with seeds, duplicating last centroid");
            let last = last.to_vec();
            while centroids.len() < k * dim {
                centroids.extend_from_slice(&last);
            }
            return centroids;
        }

        let threshold = rng.gen::<f64>() * total;
        let mut cumulative = 0.0f64;
        let mut chosen = n - 1;
        for (i, &d) in min_dists.iter().enumerate() {
            cumulative += d as f64;
            if cumulative >= threshold {
                chosen = i;
                break;
            }
        }
        centroids.extend_from_slice(points[chosen]);
    }
    centroids
}
