//! Hierarchical Navigable Small World graph.
//!
//! Every node lives on level 0 and on each level up to a randomly drawn
//! maximum (geometric with ratio `1 / ln(m)`). Search descends greedily from
//! the entry point through the upper levels and runs a best-first beam of
//! width `ef` on level 0.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distance::{squared_l2, Scored, TopK};
use crate::codec::Dataset;
use crate::error::{Result, VectorLakeError};
use crate::types::{IndexVariant, Neighbors};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    dim: usize,
    /// Max neighbours per node on levels above 0.
    m: usize,
    /// Max neighbours per node on level 0 (`2 * m`).
    m0: usize,
    ef_construction: usize,
    ef_search: usize,
    level_mult: f64,
    values: Vec<f32>,
    /// `links[node][level]` -> neighbour ids on that level.
    links: Vec<Vec<Vec<u32>>>,
    entry_point: Option<u32>,
    max_level: usize,
}

impl HnswIndex {
    pub fn new(dim: usize, m: usize, ef_search: usize, ef_construction: usize) -> Result<Self> {
        if m < 2 {
            return Err(VectorLakeError::IndexBuild {
                variant: IndexVariant::Hnsw,
                reason: format!("graph degree m must be >= 2, got {m}"),
            });
        }
        Ok(Self {
            dim,
            m,
            m0: 2 * m,
            ef_construction: ef_construction.max(1),
            ef_search: ef_search.max(1),
            level_mult: 1.0 / (m as f64).ln(),
            values: Vec::new(),
            links: Vec::new(),
            entry_point: None,
            max_level: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    fn vector(&self, id: u32) -> &[f32] {
        let i = id as usize;
        &self.values[i * self.dim..(i + 1) * self.dim]
    }

    fn random_level<R: Rng>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        (-u.ln() * self.level_mult).floor() as usize
    }

    pub fn add(&mut self, vectors: &Dataset) -> Result<()> {
        let start = self.len();
        if start + vectors.len() > u32::MAX as usize {
            return Err(VectorLakeError::IndexBuild {
                variant: IndexVariant::Hnsw,
                reason: "graph is limited to u32::MAX nodes".into(),
            });
        }
        self.values.extend_from_slice(vectors.as_slice());
        let mut rng = rand::thread_rng();
        for id in start..start + vectors.len() {
            let level = self.random_level(&mut rng);
            self.insert(id as u32, level);
        }
        Ok(())
    }

    fn insert(&mut self, id: u32, level: usize) {
        self.links.push(vec![Vec::new(); level + 1]);

        let Some(mut entry) = self.entry_point else {
            self.entry_point = Some(id);
            self.max_level = level;
            return;
        };

        let query = self.vector(id).to_vec();
        for l in (level + 1..=self.max_level).rev() {
            entry = self.greedy_closest(&query, entry, l);
        }

        for l in (0..=level.min(self.max_level)).rev() {
            let found = self.search_layer(&query, entry, self.ef_construction, l);
            let cap = if l == 0 { self.m0 } else { self.m };
            let selected: Vec<u32> = found.iter().take(self.m).map(|s| s.id as u32).collect();

            for &nb in &selected {
                self.links[nb as usize][l].push(id);
                if self.links[nb as usize][l].len() > cap {
                    self.prune(nb, l, cap);
                }
            }
            self.links[id as usize][l] = selected;
            if let Some(best) = found.first() {
                entry = best.id as u32;
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(id);
        }
    }

    /// Keep the `cap` closest neighbours of `node` on `level`.
    fn prune(&mut self, node: u32, level: usize, cap: usize) {
        let base = self.vector(node);
        let mut scored: Vec<Scored> = self.links[node as usize][level]
            .iter()
            .map(|&nb| Scored {
                dist: squared_l2(base, self.vector(nb)),
                id: nb as u64,
            })
            .collect();
        scored.sort();
        scored.truncate(cap);
        self.links[node as usize][level] = scored.into_iter().map(|s| s.id as u32).collect();
    }

    fn greedy_closest(&self, query: &[f32], mut current: u32, level: usize) -> u32 {
        let mut best = squared_l2(query, self.vector(current));
        loop {
            let mut moved = false;
            for &nb in &self.links[current as usize][level] {
                let d = squared_l2(query, self.vector(nb));
                if d < best {
                    best = d;
                    current = nb;
                    moved = true;
                }
            }
            if !moved {
                return current;
            }
        }
    }

    /// Best-first beam search on one level; returns up to `ef` nodes, nearest first.
    fn search_layer(&self, query: &[f32], entry: u32, ef: usize, level: usize) -> Vec<Scored> {
        let first = Scored {
            dist: squared_l2(query, self.vector(entry)),
            id: entry as u64,
        };
        let mut visited = HashSet::from([entry]);
        let mut candidates = BinaryHeap::from([Reverse(first)]);
        let mut results = BinaryHeap::from([first]);

        while let Some(Reverse(closest)) = candidates.pop() {
            if let Some(worst) = results.peek() {
                if closest.dist > worst.dist && results.len() >= ef {
                    break;
                }
            }
            for &nb in &self.links[closest.id as usize][level] {
                if !visited.insert(nb) {
                    continue;
                }
                let cand = Scored {
                    dist: squared_l2(query, self.vector(nb)),
                    id: nb as u64,
                };
                let admit = results.len() < ef || results.peek().is_some_and(|w| cand < *w);
                if admit {
                    candidates.push(Reverse(cand));
                    results.push(cand);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }
        results.into_sorted_vec()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Neighbors {
        let mut top = TopK::new(k);
        let Some(mut entry) = self.entry_point else {
            return top.into_neighbors();
        };
        for l in (1..=self.max_level).rev() {
            entry = self.greedy_closest(query, entry, l);
        }
        for s in self.search_layer(query, entry, self.ef_search.max(k), 0) {
            top.push(s.dist, s.id);
        }
        top.into_neighbors()
    }
}
