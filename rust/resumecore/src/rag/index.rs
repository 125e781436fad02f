//! Vector Index - segment store with exact and graph-accelerated search
//!
//! The index owns every searchable segment together with its embedding. Search
//! is an exact scan by default; filters that pin entity ids are answered from
//! an entity → slots posting list so only that entity's segments are scored.
//! Large corpora can opt into an HNSW graph for unfiltered queries, whose
//! candidates are re-scored exactly before they are returned.
//!
//! Ordering is always ascending distance, then insertion order.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{AnnConfig, IndexConfig};
use crate::error::IndexError;
use crate::hnsw::distance::{magnitude, Metric};
use crate::hnsw::index::Hnsw;

use super::document::{SearchHit, Segment, SegmentMetadata};
use super::filter::MetadataFilter;

struct IndexEntry {
    segment: Segment,
    vector: Vec<f32>,
    magnitude: f32,
    /// Node id in the graph accelerator, if one is attached
    ann_node: Option<u32>,
}

struct AnnIndex {
    graph: Hnsw,
    node_to_slot: HashMap<u32, usize>,
    next_node: u32,
    /// Candidate pool per graph query
    ef: usize,
    min_points: usize,
}

/// In-memory segment index. Immutable once published behind an `Arc`.
pub struct VectorIndex {
    metric: Metric,
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
    /// segment id -> slot
    slots: HashMap<String, usize>,
    /// entity id -> slots, in insertion order
    by_entity: HashMap<String, Vec<usize>>,
    /// entity ids in first-seen order
    entity_order: Vec<String>,
    ann: Option<AnnIndex>,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new(&IndexConfig::default())
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("metric", &self.metric)
            .field("dimensions", &self.dimensions)
            .field("segments", &self.entries.len())
            .field("entities", &self.entity_order.len())
            .field("ann", &self.ann.is_some())
            .finish()
    }
}

impl VectorIndex {
    pub fn new(config: &IndexConfig) -> Self {
        VectorIndex {
            metric: config.metric,
            dimensions: None,
            entries: Vec::new(),
            slots: HashMap::new(),
            by_entity: HashMap::new(),
            entity_order: Vec::new(),
            ann: config.ann.as_ref().map(|cfg| AnnIndex::new(cfg, config.metric)),
        }
    }

    /// Insert segments with embeddings set.
    ///
    /// Every segment is validated before anything is written, so an error
    /// leaves the index exactly as it was. Re-inserting an existing id
    /// overwrites it in place and keeps its original rank for ties.
    pub fn insert(&mut self, segments: Vec<Segment>) -> Result<usize, IndexError> {
        let mut expected = self.dimensions;

        for seg in &segments {
            let got = match &seg.embedding {
                None => {
                    return Err(IndexError::MissingEmbedding {
                        segment_id: seg.id.clone(),
                    })
                }
                Some(v) if v.is_empty() => {
                    return Err(IndexError::EmptyEmbedding {
                        segment_id: seg.id.clone(),
                    })
                }
                Some(v) => v.len(),
            };

            match expected {
                Some(dim) if dim != got => {
                    return Err(IndexError::DimensionMismatch {
                        segment_id: seg.id.clone(),
                        expected: dim,
                        got,
                    });
                }
                Some(_) => {}
                None => expected = Some(got),
            }
        }

        let count = segments.len();
        self.dimensions = expected;

        for mut seg in segments {
            let Some(vector) = seg.embedding.take() else {
                continue;
            };
            self.upsert(seg, vector)?;
        }

        Ok(count)
    }

    fn upsert(&mut self, segment: Segment, vector: Vec<f32>) -> Result<(), IndexError> {
        let magnitude = magnitude(&vector);
        let existing = self.slots.get(&segment.id).copied();
        let slot = existing.unwrap_or(self.entries.len());

        if let Some(slot) = existing {
            let old_entity = self.entries[slot].segment.metadata.entity_id.clone();
            if old_entity != segment.metadata.entity_id {
                self.remove_posting(&old_entity, slot);
                self.add_posting(&segment.metadata.entity_id, slot);
            }
            if let (Some(ann), Some(node)) = (self.ann.as_mut(), self.entries[slot].ann_node) {
                ann.graph.delete_point(node);
                ann.node_to_slot.remove(&node);
            }
        }

        let ann_node = match self.ann.as_mut() {
            Some(ann) => Some(ann.add(slot, &segment.id, vector.clone())?),
            None => None,
        };

        if existing.is_none() {
            self.slots.insert(segment.id.clone(), slot);
            self.add_posting(&segment.metadata.entity_id, slot);
        }

        let entry = IndexEntry {
            segment,
            vector,
            magnitude,
            ann_node,
        };
        match existing {
            Some(slot) => self.entries[slot] = entry,
            None => self.entries.push(entry),
        }
        Ok(())
    }

    fn add_posting(&mut self, entity_id: &str, slot: usize) {
        match self.by_entity.get_mut(entity_id) {
            Some(list) => {
                // keep postings in slot order when an upsert moves a segment
                let pos = list.partition_point(|&s| s < slot);
                list.insert(pos, slot);
            }
            None => {
                self.by_entity.insert(entity_id.to_string(), vec![slot]);
                self.entity_order.push(entity_id.to_string());
            }
        }
    }

    fn remove_posting(&mut self, entity_id: &str, slot: usize) {
        let emptied = match self.by_entity.get_mut(entity_id) {
            Some(list) => {
                list.retain(|&s| s != slot);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            self.by_entity.remove(entity_id);
            self.entity_order.retain(|e| e != entity_id);
        }
    }

    /// Up to `k` segments nearest to `query`, restricted by `filter`.
    pub fn search(&self, query: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>, IndexError> {
        self.check_query(query)?;
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let Some(filter) = filter else {
            if let Some(hits) = self.search_ann(query, k) {
                return Ok(hits);
            }
            return Ok(self.rank(query, k, 0..self.entries.len()));
        };

        let hits = match filter.pinned_entities() {
            Some(entities) => {
                let mut candidates: Vec<usize> = entities
                    .iter()
                    .filter_map(|e| self.by_entity.get(*e))
                    .flatten()
                    .copied()
                    .filter(|&slot| filter.matches(&self.entries[slot].segment.metadata))
                    .collect();
                candidates.sort_unstable();
                candidates.dedup();
                debug!(candidates = candidates.len(), "entity-pinned search");
                self.rank(query, k, candidates)
            }
            None => self.search_by(query, k, |meta| filter.matches(meta))?,
        };

        Ok(hits)
    }

    /// Like [`search`](Self::search) with an arbitrary metadata predicate.
    /// The predicate runs on every segment before any distance is computed.
    pub fn search_by<F>(&self, query: &[f32], k: usize, predicate: F) -> Result<Vec<SearchHit>, IndexError>
    where
        F: Fn(&SegmentMetadata) -> bool,
    {
        self.check_query(query)?;
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = (0..self.entries.len()).filter(|&slot| predicate(&self.entries[slot].segment.metadata));
        Ok(self.rank(query, k, candidates))
    }

    fn check_query(&self, query: &[f32]) -> Result<(), IndexError> {
        match self.dimensions {
            Some(dim) if dim != query.len() => Err(IndexError::QueryDimensionMismatch {
                expected: dim,
                got: query.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Exact scoring of candidate slots, top `k` by (distance, slot).
    fn rank<I>(&self, query: &[f32], k: usize, candidates: I) -> Vec<SearchHit>
    where
        I: IntoIterator<Item = usize>,
    {
        let query_mag = magnitude(query);

        let mut scored: Vec<(f32, usize)> = candidates
            .into_iter()
            .map(|slot| {
                let entry = &self.entries[slot];
                let d = self
                    .metric
                    .distance(query, Some(query_mag), &entry.vector, Some(entry.magnitude));
                (d, slot)
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(distance, slot)| SearchHit {
                segment: self.entries[slot].segment.clone(),
                distance,
            })
            .collect()
    }

    /// Graph path for unfiltered searches. `None` means use the exact scan.
    ///
    /// The graph orders equal similarities by node id, which an upsert
    /// reassigns, so a pool wider than `k` is re-ranked by slot. When the tie
    /// at the cut-off runs to the edge of the pool the exact scan decides.
    fn search_ann(&self, query: &[f32], k: usize) -> Option<Vec<SearchHit>> {
        let ann = self.ann.as_ref()?;
        let len = self.entries.len();
        if len < ann.min_points {
            return None;
        }

        let wanted = k.min(len);
        let pool = k.max(ann.ef).min(len);
        let slots: Vec<usize> = ann
            .graph
            .search_knn(query, pool)
            .into_iter()
            .filter_map(|(node, _)| ann.node_to_slot.get(&node).copied())
            .collect();

        if slots.len() < wanted {
            debug!(found = slots.len(), wanted, "graph search short, falling back to exact scan");
            return None;
        }

        let mut hits = self.rank(query, slots.len(), slots);
        if hits.len() < len {
            let cutoff = hits[wanted - 1].distance;
            let edge = hits[hits.len() - 1].distance;
            if cutoff >= edge {
                debug!(pool = hits.len(), wanted, "tie reaches edge of graph pool, falling back to exact scan");
                return None;
            }
        }

        hits.truncate(k);
        Some(hits)
    }

    pub fn get(&self, segment_id: &str) -> Option<&Segment> {
        self.slots.get(segment_id).map(|&slot| &self.entries[slot].segment)
    }

    /// Stored embedding of a segment.
    pub fn embedding(&self, segment_id: &str) -> Option<&[f32]> {
        self.slots
            .get(segment_id)
            .map(|&slot| self.entries[slot].vector.as_slice())
    }

    /// Up to `limit` segments of one entity, in insertion order.
    pub fn segments_for_entity(&self, entity_id: &str, limit: usize) -> Vec<Segment> {
        self.by_entity
            .get(entity_id)
            .map(|slots| {
                slots
                    .iter()
                    .take(limit)
                    .map(|&slot| self.entries[slot].segment.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entity ids in the order they were first inserted.
    pub fn entity_ids(&self) -> &[String] {
        &self.entity_order
    }

    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.by_entity.get(entity_id).map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fixed by the first insertion.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn has_graph(&self) -> bool {
        self.ann.is_some()
    }
}

impl AnnIndex {
    fn new(config: &AnnConfig, metric: Metric) -> Self {
        AnnIndex {
            graph: Hnsw::new(config.m, config.ef_construction, metric),
            node_to_slot: HashMap::new(),
            next_node: 0,
            ef: config.ef_construction,
            min_points: config.min_points,
        }
    }

    fn add(&mut self, slot: usize, segment_id: &str, vector: Vec<f32>) -> Result<u32, IndexError> {
        let node = self.next_node;
        self.graph.add_point(node, vector).map_err(|e| IndexError::Graph {
            segment_id: segment_id.to_string(),
            reason: e.to_string(),
        })?;
        self.next_node += 1;
        self.node_to_slot.insert(node, slot);
        Ok(node)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::document::SegmentMetadata;

    fn seg(id: &str, entity: &str, vector: Vec<f32>) -> Segment {
        Segment {
            id: id.to_string(),
            text: format!("text of {id}"),
            metadata: SegmentMetadata {
                entity_id: entity.to_string(),
                display_name: format!("Applicant {entity}"),
                source_name: format!("{entity}.pdf"),
                page_number: 1,
                chunk_index: 0,
                start: 0,
                end: 10,
            },
            embedding: Some(vector),
        }
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.segment.id.as_str()).collect()
    }

    #[test]
    fn test_insert_and_search() {
        let mut index = VectorIndex::default();
        index
            .insert(vec![
                seg("a", "A", vec![1.0, 0.0, 0.0]),
                seg("b", "B", vec![0.0, 1.0, 0.0]),
                seg("c", "C", vec![0.0, 0.0, 1.0]),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 1, None).unwrap();
        assert_eq!(ids(&hits), vec!["a"]);
        assert!(hits[0].distance.abs() < 1e-6);
        assert!(hits[0].segment.embedding.is_none());
    }

    #[test]
    fn test_own_embedding_ranks_first() {
        let mut index = VectorIndex::default();
        let vectors = [vec![0.3, 0.1, 0.9], vec![0.8, 0.2, 0.1], vec![0.1, 0.9, 0.4]];
        index
            .insert(vectors.iter().enumerate().map(|(i, v)| seg(&format!("s{i}"), "A", v.clone())).collect())
            .unwrap();

        for (i, v) in vectors.iter().enumerate() {
            let hits = index.search(v, 3, None).unwrap();
            assert_eq!(hits[0].segment.id, format!("s{i}"));
            assert!(hits[0].distance.abs() < 1e-6);
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = VectorIndex::default();
        assert!(index.search(&[1.0, 0.0], 5, None).unwrap().is_empty());

        let mut index = VectorIndex::default();
        index.insert(vec![seg("a", "A", vec![1.0, 0.0])]).unwrap();
        assert!(index.search(&[1.0, 0.0], 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_k_larger_than_candidates() {
        let mut index = VectorIndex::default();
        index
            .insert(vec![seg("a", "A", vec![1.0, 0.0]), seg("b", "B", vec![0.0, 1.0])])
            .unwrap();

        assert_eq!(index.search(&[1.0, 1.0], 10, None).unwrap().len(), 2);
    }

    #[test]
    fn test_dimension_guard_leaves_index_intact() {
        let mut index = VectorIndex::default();
        index.insert(vec![seg("a", "A", vec![1.0, 0.0, 0.0])]).unwrap();

        let err = index
            .insert(vec![seg("b", "B", vec![0.0, 1.0, 0.0]), seg("c", "C", vec![1.0, 0.0])])
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                segment_id: "c".to_string(),
                expected: 3,
                got: 2
            }
        );

        // nothing from the failed batch landed
        assert_eq!(index.len(), 1);
        assert!(index.get("b").is_none());
        let hits = index.search(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert_eq!(ids(&hits), vec!["a"]);
    }

    #[test]
    fn test_dimension_mismatch_inside_first_batch() {
        let mut index = VectorIndex::default();
        let err = index
            .insert(vec![seg("a", "A", vec![1.0, 0.0]), seg("b", "A", vec![1.0, 0.0, 0.0])])
            .unwrap_err();

        assert!(matches!(err, IndexError::DimensionMismatch { expected: 2, got: 3, .. }));
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), None);
    }

    #[test]
    fn test_missing_and_empty_embeddings() {
        let mut index = VectorIndex::default();

        let mut missing = seg("a", "A", vec![1.0]);
        missing.embedding = None;
        assert_eq!(
            index.insert(vec![missing]),
            Err(IndexError::MissingEmbedding { segment_id: "a".to_string() })
        );

        assert_eq!(
            index.insert(vec![seg("b", "B", Vec::new())]),
            Err(IndexError::EmptyEmbedding { segment_id: "b".to_string() })
        );
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let mut index = VectorIndex::default();
        index.insert(vec![seg("a", "A", vec![1.0, 0.0, 0.0])]).unwrap();

        assert_eq!(
            index.search(&[1.0, 0.0], 3, None),
            Err(IndexError::QueryDimensionMismatch { expected: 3, got: 2 })
        );
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let mut index = VectorIndex::default();
        index
            .insert(vec![
                seg("first", "A", vec![0.0, 1.0]),
                seg("second", "B", vec![0.0, 2.0]),
                seg("third", "C", vec![0.0, 3.0]),
            ])
            .unwrap();

        // all three are at cosine distance 0 from the query
        let hits = index.search(&[0.0, 5.0], 3, None).unwrap();
        assert_eq!(ids(&hits), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_upsert_overwrites_and_keeps_rank() {
        let mut index = VectorIndex::default();
        index
            .insert(vec![seg("a", "A", vec![1.0, 0.0]), seg("b", "B", vec![0.0, 1.0])])
            .unwrap();

        index.insert(vec![seg("a", "A", vec![0.0, 1.0])]).unwrap();
        assert_eq!(index.len(), 2);

        // a now ties with b and still comes first
        let hits = index.search(&[0.0, 1.0], 2, None).unwrap();
        assert_eq!(ids(&hits), vec!["a", "b"]);
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(index.embedding("a"), Some(&[0.0, 1.0][..]));
    }

    #[test]
    fn test_upsert_can_move_entity() {
        let mut index = VectorIndex::default();
        index.insert(vec![seg("a", "A", vec![1.0, 0.0])]).unwrap();
        index.insert(vec![seg("a", "B", vec![1.0, 0.0])]).unwrap();

        assert!(index.segments_for_entity("A", 10).is_empty());
        assert_eq!(index.segments_for_entity("B", 10).len(), 1);
        assert!(!index.contains_entity("A"));
        assert_eq!(index.entity_ids(), &["B".to_string()]);
    }

    #[test]
    fn test_entity_filter_matches_scan() {
        let mut index = VectorIndex::default();
        let mut segments = Vec::new();
        for i in 0..30 {
            let entity = ["A", "B", "C"][i % 3];
            let angle = i as f32 * 0.1;
            segments.push(seg(&format!("s{i}"), entity, vec![angle.cos(), angle.sin()]));
        }
        index.insert(segments).unwrap();

        let filter = MetadataFilter::entities(["C", "A"]);
        let query = [0.6, 0.8];

        let pinned = index.search(&query, 7, Some(&filter)).unwrap();
        let scanned = index.search_by(&query, 7, |m| m.entity_id == "A" || m.entity_id == "C").unwrap();

        assert_eq!(pinned, scanned);
        assert_eq!(pinned.len(), 7);
        assert!(pinned.iter().all(|h| h.segment.entity_id() != "B"));
    }

    #[test]
    fn test_cap_with_filter() {
        let mut index = VectorIndex::default();
        let mut segments: Vec<Segment> = (0..10)
            .map(|i| seg(&format!("a{i}"), "A", vec![1.0, i as f32 * 0.1]))
            .collect();
        segments.push(seg("b0", "B", vec![0.0, 1.0]));
        index.insert(segments).unwrap();

        let a = index.search(&[1.0, 0.0], 3, Some(&MetadataFilter::entity("A"))).unwrap();
        assert_eq!(ids(&a), vec!["a0", "a1", "a2"]);

        let b = index.search(&[1.0, 0.0], 3, Some(&MetadataFilter::entity("B"))).unwrap();
        assert_eq!(ids(&b), vec!["b0"]);

        let none = index.search(&[1.0, 0.0], 3, Some(&MetadataFilter::entity("Z"))).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_unpinned_filter_scans_metadata() {
        let mut index = VectorIndex::default();
        let mut on_page_two = seg("p2", "A", vec![1.0, 0.0]);
        on_page_two.metadata.page_number = 2;
        index
            .insert(vec![seg("p1", "A", vec![1.0, 0.0]), on_page_two])
            .unwrap();

        let filter = MetadataFilter::PageRange { min: Some(2), max: None };
        let hits = index.search(&[1.0, 0.0], 5, Some(&filter)).unwrap();
        assert_eq!(ids(&hits), vec!["p2"]);
    }

    #[test]
    fn test_euclidean_metric() {
        let config = IndexConfig {
            metric: Metric::Euclidean,
            ann: None,
        };
        let mut index = VectorIndex::new(&config);
        index
            .insert(vec![seg("near", "A", vec![1.0, 1.0]), seg("far", "B", vec![10.0, 10.0])])
            .unwrap();

        let hits = index.search(&[2.0, 2.0], 2, None).unwrap();
        assert_eq!(ids(&hits), vec!["near", "far"]);
        assert!((hits[0].distance - 2.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_entity_accessors() {
        let mut index = VectorIndex::default();
        index
            .insert(vec![
                seg("b0", "B", vec![1.0, 0.0]),
                seg("a0", "A", vec![1.0, 0.0]),
                seg("b1", "B", vec![0.0, 1.0]),
                seg("b2", "B", vec![0.5, 0.5]),
            ])
            .unwrap();

        assert_eq!(index.entity_ids(), &["B".to_string(), "A".to_string()]);
        let b: Vec<String> = index.segments_for_entity("B", 2).into_iter().map(|s| s.id).collect();
        assert_eq!(b, vec!["b0", "b1"]);
        assert!(index.segments_for_entity("nobody", 10).is_empty());
        assert_eq!(index.dimensions(), Some(2));
    }

    fn ann_index(min_points: usize) -> VectorIndex {
        VectorIndex::new(&IndexConfig {
            metric: Metric::Cosine,
            ann: Some(AnnConfig {
                m: 16,
                ef_construction: 100,
                min_points,
            }),
        })
    }

    fn grid_segments(n: usize) -> Vec<Segment> {
        let mut state: u64 = 42;
        (0..n)
            .map(|i| {
                let v: Vec<f32> = (0..8)
                    .map(|_| {
                        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                        ((state >> 40) as f32 / (1u64 << 24) as f32) - 0.5
                    })
                    .collect();
                seg(&format!("s{i}"), ["A", "B"][i % 2], v)
            })
            .collect()
    }

    #[test]
    fn test_graph_results_are_rescored_exactly() {
        let mut exact = VectorIndex::default();
        let mut graph = ann_index(1);
        exact.insert(grid_segments(200)).unwrap();
        graph.insert(grid_segments(200)).unwrap();
        assert!(graph.has_graph());

        let query = [0.1, -0.2, 0.3, 0.05, -0.4, 0.2, 0.0, 0.1];
        let from_graph = graph.search(&query, 10, None).unwrap();
        let from_scan = exact.search(&query, 10, None).unwrap();

        assert_eq!(from_graph.len(), 10);
        assert!(from_graph.windows(2).all(|w| w[0].distance <= w[1].distance));
        // top hit must agree, every reported distance must be exact
        assert_eq!(from_graph[0].segment.id, from_scan[0].segment.id);
        for hit in &from_graph {
            let v = exact.embedding(&hit.segment.id).unwrap();
            let d = Metric::Cosine.distance(&query, None, v, None);
            assert!((hit.distance - d).abs() < 1e-5);
        }
    }

    #[test]
    fn test_filtered_search_ignores_graph() {
        let mut exact = VectorIndex::default();
        let mut graph = ann_index(1);
        exact.insert(grid_segments(100)).unwrap();
        graph.insert(grid_segments(100)).unwrap();

        let query = [0.3, 0.3, -0.1, 0.2, 0.0, -0.3, 0.1, 0.4];
        let filter = MetadataFilter::entity("B");
        assert_eq!(
            graph.search(&query, 5, Some(&filter)).unwrap(),
            exact.search(&query, 5, Some(&filter)).unwrap()
        );
    }

    #[test]
    fn test_graph_upsert_hides_old_vector() {
        let mut index = ann_index(1);
        index
            .insert(vec![seg("a", "A", vec![1.0, 0.0]), seg("b", "B", vec![0.7, 0.7])])
            .unwrap();
        index.insert(vec![seg("a", "A", vec![0.0, 1.0])]).unwrap();

        let hits = index.search(&[1.0, 0.0], 2, None).unwrap();
        assert_eq!(ids(&hits), vec!["b", "a"]);
        assert_eq!(index.len(), 2);
    }

    fn collinear(ids: &[&str]) -> Vec<Segment> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| seg(id, "A", vec![(i + 1) as f32, 0.0]))
            .collect()
    }

    #[test]
    fn test_graph_ties_keep_insertion_order_after_upsert() {
        let mut graph = ann_index(1);
        let mut exact = VectorIndex::default();
        for index in [&mut graph, &mut exact] {
            index.insert(collinear(&["a", "b", "c"])).unwrap();
            index.insert(vec![seg("a", "A", vec![1.0, 0.0])]).unwrap();
        }

        for k in 1..=3 {
            let from_graph = graph.search(&[1.0, 0.0], k, None).unwrap();
            let from_scan = exact.search(&[1.0, 0.0], k, None).unwrap();
            assert_eq!(ids(&from_graph), ids(&from_scan));
        }
        assert_eq!(ids(&graph.search(&[1.0, 0.0], 1, None).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_tie_wider_than_graph_pool_uses_exact_scan() {
        let mut index = VectorIndex::new(&IndexConfig {
            metric: Metric::Cosine,
            ann: Some(AnnConfig {
                m: 16,
                ef_construction: 2,
                min_points: 1,
            }),
        });
        index.insert(collinear(&["a", "b", "c", "d", "e"])).unwrap();
        index.insert(vec![seg("a", "A", vec![1.0, 0.0])]).unwrap();

        let hits = index.search(&[1.0, 0.0], 2, None).unwrap();
        assert_eq!(ids(&hits), vec!["a", "b"]);
    }

    #[test]
    fn test_small_corpus_uses_exact_scan() {
        let mut index = ann_index(1000);
        index.insert(grid_segments(20)).unwrap();

        let mut exact = VectorIndex::default();
        exact.insert(grid_segments(20)).unwrap();

        let query = [0.5; 8];
        assert_eq!(index.search(&query, 20, None).unwrap(), exact.search(&query, 20, None).unwrap());
    }
}
