//! HNSW (Hierarchical Navigable Small World) graph
//!
//! Approximate nearest-neighbour accelerator for large segment corpora. The
//! vector index keeps the authoritative copy of every embedding and re-scores
//! whatever the graph proposes, so the graph only has to be good at recall.
//!
//! # Algorithm Overview
//! - Higher layers have fewer nodes (exponential decay)
//! - Search starts from the top layer, greedily descending
//! - Each layer is a navigable small-world graph
//!
//! # Performance Characteristics
//! - Insert: O(log N) average
//! - Search: O(log N) average
//! - Memory: O(N * M) where M = max neighbors per node

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use thiserror::Error;

use super::distance::{magnitude, Metric};
use super::node::HnswNode;
use super::pqueue::ScoredItem;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HnswError {
    #[error("duplicate node id {0}")]
    DuplicateId(u32),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("empty vector")]
    EmptyVector,
}

/// HNSW graph over `u32` node ids.
///
/// # Example
/// ```ignore
/// let mut hnsw = Hnsw::new(16, 200, Metric::Cosine);
/// hnsw.add_point(1, vec![0.1, 0.2, 0.3])?;
/// let results = hnsw.search_knn(&[0.1, 0.2, 0.3], 10);
/// ```
#[derive(Debug, Clone)]
pub struct Hnsw {
    m: usize,               // Max neighbors per level (M in paper)
    m_max0: usize,          // Max neighbors at level 0 (usually 2*M)
    ef_construction: usize, // Search depth during construction
    level_mult: f32,        // Level generation multiplier (1/ln(M))
    metric: Metric,

    nodes: HashMap<u32, HnswNode>,
    entry_point_id: Option<u32>,
    level_max: u8,
    dimension: Option<usize>,

    // LCG state for level selection, fixed seed keeps builds reproducible
    rng_state: u64,
}

impl Hnsw {
    /// # Arguments
    /// * `m` - Max neighbors per node per layer (typically 16-64)
    /// * `ef_construction` - Search beam width during construction (typically 100-500)
    /// * `metric` - Distance metric, must match the owning index
    pub fn new(m: usize, ef_construction: usize, metric: Metric) -> Self {
        let m = m.max(2);
        let level_mult = 1.0 / (m as f32).ln();

        Hnsw {
            m,
            m_max0: m * 2,
            ef_construction: ef_construction.max(1),
            level_mult,
            metric,
            nodes: HashMap::new(),
            entry_point_id: None,
            level_max: 0,
            dimension: None,
            rng_state: 42,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn add_point(&mut self, id: u32, vector: Vec<f32>) -> Result<(), HnswError> {
        if vector.is_empty() {
            return Err(HnswError::EmptyVector);
        }

        if self.nodes.contains_key(&id) {
            return Err(HnswError::DuplicateId(id));
        }

        match self.dimension {
            Some(dim) if vector.len() != dim => {
                return Err(HnswError::DimensionMismatch {
                    expected: dim,
                    got: vector.len(),
                });
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }

        let level = self.select_level();
        let node = HnswNode::new(id, level, vector, (level as usize) + 1);

        let Some(mut ep_id) = self.entry_point_id else {
            self.entry_point_id = Some(id);
            self.level_max = level;
            self.nodes.insert(id, node);
            return Ok(());
        };

        let query = node.vector.clone();
        let query_mag = node.magnitude();
        self.nodes.insert(id, node);

        // Phase 1: greedy descent from the top down to level + 1
        let mut current_level = self.level_max;
        while current_level > level {
            ep_id = self.search_layer_single(ep_id, &query, query_mag, current_level, false);
            current_level -= 1;
        }

        // Phase 2: link at every level from the node's level down to 0
        for lc in (0..=level.min(self.level_max)).rev() {
            let neighbors = self.search_layer(ep_id, &query, query_mag, self.ef_construction, lc, false);

            let m_limit = if lc == 0 { self.m_max0 } else { self.m };
            let selected: Vec<u32> = neighbors
                .iter()
                .filter(|(nid, _)| *nid != id)
                .take(m_limit)
                .map(|(nid, _)| *nid)
                .collect();

            for &neighbor_id in &selected {
                self.link(neighbor_id, id, lc);
                self.link(id, neighbor_id, lc);
            }

            for &neighbor_id in &selected {
                self.prune_neighbors(neighbor_id, lc, m_limit);
            }

            if let Some((nearest, _)) = neighbors.first() {
                ep_id = *nearest;
            }
        }

        if level > self.level_max {
            self.entry_point_id = Some(id);
            self.level_max = level;
        }

        Ok(())
    }

    /// Up to `k` live nodes closest to `query`, sorted by similarity (descending).
    pub fn search_knn(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let Some(mut ep_id) = self.entry_point_id else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let query_mag = magnitude(query);

        let mut current_level = self.level_max;
        while current_level > 0 {
            ep_id = self.search_layer_single(ep_id, query, query_mag, current_level, true);
            current_level -= 1;
        }

        let ef = k.max(self.ef_construction);
        self.search_layer(ep_id, query, query_mag, ef, 0, true)
            .into_iter()
            .filter(|(id, _)| self.nodes.get(id).map(|n| !n.deleted).unwrap_or(false))
            .take(k)
            .collect()
    }

    /// Soft delete. The node keeps routing traffic but is never returned.
    pub fn delete_point(&mut self, id: u32) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.deleted = true;
        }
    }

    /// Number of nodes, including soft-deleted ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ========================================================================
    // Internal Methods
    // ========================================================================

    /// level = floor(-ln(uniform) * level_mult), capped at 16
    fn select_level(&mut self) -> u8 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        let r = ((self.rng_state >> 33) as f32 / (u32::MAX >> 1) as f32).clamp(1e-7, 1.0);

        let level = (-r.ln() * self.level_mult).floor() as u8;
        level.min(16)
    }

    /// Greedy walk at one level, returns the closest node found.
    fn search_layer_single(&self, entry_id: u32, query: &[f32], query_mag: f32, level: u8, skip_deleted: bool) -> u32 {
        let mut current_id = entry_id;
        let mut current_sim = self.similarity(current_id, query, query_mag);

        loop {
            let mut changed = false;

            if let Some(node) = self.nodes.get(&current_id) {
                if let Some(neighbors) = node.neighbors.get(level as usize) {
                    for &nid in neighbors {
                        if skip_deleted && self.nodes.get(&nid).map(|n| n.deleted).unwrap_or(true) {
                            continue;
                        }

                        let sim = self.similarity(nid, query, query_mag);
                        if sim > current_sim {
                            current_id = nid;
                            current_sim = sim;
                            changed = true;
                        }
                    }
                }
            }

            if !changed {
                break;
            }
        }

        current_id
    }

    /// Beam search at one level, returns up to `ef` nodes sorted by similarity (descending).
    fn search_layer(&self, entry_id: u32, query: &[f32], query_mag: f32, ef: usize, level: u8, skip_deleted: bool) -> Vec<(u32, f32)> {
        let mut visited: HashSet<u32> = HashSet::new();

        // Candidates: max-heap, explore the most similar first
        let mut candidates: BinaryHeap<ScoredItem<u32>> = BinaryHeap::new();

        // Results: min-heap, evict the least similar
        let mut results: BinaryHeap<Reverse<ScoredItem<u32>>> = BinaryHeap::new();

        let entry_sim = self.similarity(entry_id, query, query_mag);

        visited.insert(entry_id);
        candidates.push(ScoredItem { score: entry_sim, item: entry_id });
        results.push(Reverse(ScoredItem { score: entry_sim, item: entry_id }));

        while let Some(ScoredItem { score: c_sim, item: c_id }) = candidates.pop() {
            let worst_sim = results.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
            if c_sim < worst_sim && results.len() >= ef {
                break;
            }

            let Some(node) = self.nodes.get(&c_id) else {
                continue;
            };
            let Some(neighbors) = node.neighbors.get(level as usize) else {
                continue;
            };

            for &nid in neighbors {
                if !visited.insert(nid) {
                    continue;
                }
                if skip_deleted && self.nodes.get(&nid).map(|n| n.deleted).unwrap_or(true) {
                    // still worth walking through for connectivity
                    candidates.push(ScoredItem { score: self.similarity(nid, query, query_mag), item: nid });
                    continue;
                }

                let n_sim = self.similarity(nid, query, query_mag);
                let worst = results.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
                if n_sim > worst || results.len() < ef {
                    candidates.push(ScoredItem { score: n_sim, item: nid });
                    results.push(Reverse(ScoredItem { score: n_sim, item: nid }));

                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut result_vec: Vec<(u32, f32)> = results
            .into_iter()
            .map(|r| (r.0.item, r.0.score))
            .collect();
        result_vec.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        result_vec
    }

    fn link(&mut self, from_id: u32, to_id: u32, level: u8) {
        if let Some(node) = self.nodes.get_mut(&from_id) {
            while node.neighbors.len() <= level as usize {
                node.neighbors.push(Vec::new());
            }
            node.add_neighbor(level as usize, to_id);
        }
    }

    /// Keep the `max_neighbors` most similar links of a node at one level.
    fn prune_neighbors(&mut self, node_id: u32, level: u8, max_neighbors: usize) {
        let (node_vec, node_mag, neighbors) = {
            let Some(node) = self.nodes.get(&node_id) else {
                return;
            };
            match node.neighbors.get(level as usize) {
                Some(list) if list.len() > max_neighbors => {
                    (node.vector.clone(), node.magnitude(), list.clone())
                }
                _ => return,
            }
        };

        let mut scored: Vec<(u32, f32)> = neighbors
            .into_iter()
            .map(|nid| (nid, self.similarity(nid, &node_vec, node_mag)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(max_neighbors);

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.neighbors[level as usize] = scored.into_iter().map(|(nid, _)| nid).collect();
        }
    }

    /// Higher = more similar.
    fn similarity(&self, node_id: u32, query: &[f32], query_mag: f32) -> f32 {
        match self.nodes.get(&node_id) {
            Some(node) => self
                .metric
                .similarity(&node.vector, Some(node.magnitude()), query, Some(query_mag)),
            None => f32::NEG_INFINITY,
        }
    }
}

impl Default for Hnsw {
    fn default() -> Self {
        Self::new(16, 200, Metric::Cosine)
    }
}
