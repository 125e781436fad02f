//! Query-time retrieval over one published index.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{ProviderTimeout, RetrieveError};
use crate::providers::EmbeddingProvider;

use super::document::{SearchHit, Segment};
use super::filter::MetadataFilter;
use super::index::VectorIndex;

/// Read-only view over an index plus the embedder that built it.
///
/// Cloning is cheap; the index is shared, never copied.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl Retriever {
    /// `timeout` bounds every embedding call made for a query.
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { index, embedder, timeout }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Top `k` segments for free text, closest first.
    pub async fn retrieve_by_query(&self, text: &str, k: usize) -> Result<Vec<Segment>, RetrieveError> {
        let hits = self.search(text, k, None).await?;
        Ok(hits.into_iter().map(|h| h.segment).collect())
    }

    /// Scored search, optionally restricted by a metadata filter.
    pub async fn search(
        &self,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>, RetrieveError> {
        let query = self.embed_query(text).await?;
        let hits = self.index.search(&query, k, filter)?;
        debug!(k, hits = hits.len(), filtered = filter.is_some(), "query search");
        Ok(hits)
    }

    /// Segments of each requested entity, in request order.
    ///
    /// Ids are trimmed and not deduplicated; each contributes at most
    /// `per_entity_cap` segments in insertion order. An id that was never
    /// ingested contributes nothing.
    pub fn retrieve_by_entity_ids<S: AsRef<str>>(&self, entity_ids: &[S], per_entity_cap: usize) -> Vec<Segment> {
        let mut out = Vec::new();
        for id in entity_ids {
            let id = id.as_ref().trim();
            let segments = self.index.segments_for_entity(id, per_entity_cap);
            if segments.is_empty() {
                debug!(entity_id = id, "no segments for entity");
            }
            out.extend(segments);
        }
        out
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrieveError> {
        match tokio::time::timeout(self.timeout, self.embedder.embed(text)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderTimeout {
                operation: "query embedding",
                after: self.timeout,
            }
            .into()),
        }
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("index", &self.index)
            .field("embedder", &self.embedder.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
