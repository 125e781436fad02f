//! RAG Pipeline Orchestrator
//!
//! Drives one ingestion batch: pre-flight checks, per-document extraction,
//! chunking, concurrent embedding and index construction. The index is built
//! in local scope and handed back whole; nothing is shared until the caller
//! publishes it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use instant::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::{IndexConfig, IngestConfig, RagConfig};
use crate::error::{ConfigError, ExtractError, IndexError, IngestError, InputMismatch};
use crate::providers::{EmbeddingProvider, PlainTextExtractor, TextExtractor};

use super::chunker::Chunker;
use super::document::{Document, Page, RawDocument, Segment};
use super::index::VectorIndex;

/// A document skipped during ingestion. The rest of the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub source_name: String,
    pub entity_id: String,
    pub error: ExtractError,
}

/// Counters and per-phase timings (microseconds) for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub documents: usize,
    pub extracted: usize,
    pub failed: usize,
    pub segments: usize,
    pub extract_us: u64,
    pub chunk_us: u64,
    pub embed_us: u64,
    pub index_us: u64,
    pub total_us: u64,
}

/// Result of a successful batch, ready to publish.
#[derive(Debug)]
pub struct IngestOutcome {
    pub index: VectorIndex,
    /// Ids of the documents that were extracted, in upload order.
    pub entity_ids: Vec<String>,
    pub failures: Vec<DocumentFailure>,
    pub stats: IngestStats,
}

/// Ingestion orchestrator.
///
/// # Example
/// ```ignore
/// let pipeline = Pipeline::from_config(&RagConfig::default())?;
/// let outcome = pipeline
///     .ingest(vec![RawDocument::new("cv.txt", bytes)], &["candidate-1".to_string()])
///     .await?;
/// ```
pub struct Pipeline {
    chunker: Chunker,
    index_config: IndexConfig,
    ingest: IngestConfig,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Pipeline {
    /// Configuration errors (including chunking) surface here, once.
    pub fn new(
        config: &RagConfig,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let chunker = config.chunking.chunker()?;

        Ok(Self {
            chunker,
            index_config: config.index.clone(),
            ingest: config.ingest.clone(),
            extractor,
            embedder,
        })
    }

    /// Plain-text extraction plus the configured embedding backend.
    pub fn from_config(config: &RagConfig) -> Result<Self, ConfigError> {
        let embedder = config.embedding.build()?;
        Self::new(config, Arc::new(PlainTextExtractor), embedder)
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn provider_timeout(&self) -> Duration {
        self.ingest.provider_timeout()
    }

    /// Build a fresh index from a batch of documents.
    ///
    /// `entity_ids[i]` belongs to `documents[i]`. Ids are trimmed and must be
    /// non-blank and unique. Extraction failures are collected in
    /// [`IngestOutcome::failures`]; any embedding failure aborts the batch.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn ingest(&self, documents: Vec<RawDocument>, entity_ids: &[String]) -> Result<IngestOutcome, IngestError> {
        let total_start = Instant::now();
        let ids = preflight(&documents, entity_ids)?;
        let received = documents.len();

        // Phase 1: extract
        let phase = Instant::now();
        let mut extracted = Vec::with_capacity(received);
        let mut failures = Vec::new();

        for (position, (raw, entity_id)) in documents.into_iter().zip(ids).enumerate() {
            match self.extract(&raw) {
                Ok(pages) => extracted.push(Document {
                    source_name: raw.source_name,
                    entity_id,
                    display_name: format!("Applicant {}", position + 1),
                    pages,
                }),
                Err(error) => {
                    warn!(source_name = %raw.source_name, entity_id = %entity_id, %error, "skipping document");
                    failures.push(DocumentFailure {
                        source_name: raw.source_name,
                        entity_id,
                        error,
                    });
                }
            }
        }
        let extract_us = phase.elapsed().as_micros() as u64;

        // Phase 2: chunk
        let phase = Instant::now();
        let segments = self.chunker.split(&extracted);
        let chunk_us = phase.elapsed().as_micros() as u64;

        if segments.is_empty() {
            warn!(failed = failures.len(), "no text to index");
            return Err(IngestError::NoSegments {
                documents: received,
                failed: failures.len(),
            });
        }

        // Phase 3: embed
        let phase = Instant::now();
        let segment_count = segments.len();
        let segments = self.embed_all(segments).await?;
        let embed_us = phase.elapsed().as_micros() as u64;

        // Phase 4: index
        let phase = Instant::now();
        let mut index = VectorIndex::new(&self.index_config);
        index.insert(segments)?;
        let index_us = phase.elapsed().as_micros() as u64;

        let stats = IngestStats {
            documents: received,
            extracted: extracted.len(),
            failed: failures.len(),
            segments: segment_count,
            extract_us,
            chunk_us,
            embed_us,
            index_us,
            total_us: total_start.elapsed().as_micros() as u64,
        };

        info!(
            extracted = stats.extracted,
            failed = stats.failed,
            segments = stats.segments,
            total_us = stats.total_us,
            "ingest complete"
        );

        Ok(IngestOutcome {
            index,
            entity_ids: extracted.into_iter().map(|d| d.entity_id).collect(),
            failures,
            stats,
        })
    }

    fn extract(&self, raw: &RawDocument) -> Result<Vec<Page>, ExtractError> {
        let limit = self.ingest.max_document_bytes;
        if raw.bytes.len() > limit {
            return Err(ExtractError::TooLarge {
                size: raw.bytes.len(),
                limit,
            });
        }
        self.extractor.extract(&raw.source_name, &raw.bytes)
    }

    /// Embed every segment with at most `embed_concurrency` calls in flight.
    ///
    /// Output order is input order regardless of completion order. The first
    /// failure aborts every outstanding call.
    async fn embed_all(&self, segments: Vec<Segment>) -> Result<Vec<Segment>, IngestError> {
        let semaphore = Arc::new(Semaphore::new(self.ingest.embed_concurrency));
        let timeout = self.ingest.provider_timeout();
        let expected = self.embedder.dimensions();

        let mut tasks = JoinSet::new();
        let mut task_positions = HashMap::new();

        for (position, segment) in segments.iter().enumerate() {
            let semaphore = semaphore.clone();
            let embedder = self.embedder.clone();
            let segment_id = segment.id.clone();
            let text = segment.text.clone();

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| IngestError::Worker {
                    segment_id: segment_id.clone(),
                    reason: e.to_string(),
                })?;

                let vector = match tokio::time::timeout(timeout, embedder.embed(&text)).await {
                    Ok(Ok(vector)) => vector,
                    Ok(Err(source)) => return Err(IngestError::Embed { segment_id, source }),
                    Err(_) => return Err(IngestError::ProviderTimeout { segment_id, after: timeout }),
                };

                if vector.len() != expected {
                    return Err(IndexError::DimensionMismatch {
                        segment_id,
                        expected,
                        got: vector.len(),
                    }
                    .into());
                }
                Ok::<_, IngestError>((position, vector))
            });
            task_positions.insert(handle.id(), position);
        }

        debug!(segments = segments.len(), "embedding tasks spawned");

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; segments.len()];
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok((position, vector)))) => vectors[position] = Some(vector),
                Ok((_, Err(err))) => {
                    tasks.abort_all();
                    warn!(error = %err, "embedding failed, aborting batch");
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    let segment_id = task_positions
                        .get(&join_err.id())
                        .map(|&p| segments[p].id.clone())
                        .unwrap_or_default();
                    return Err(IngestError::Worker {
                        segment_id,
                        reason: join_err.to_string(),
                    });
                }
            }
        }

        segments
            .into_iter()
            .zip(vectors)
            .map(|(segment, vector)| match vector {
                Some(vector) => Ok(segment.with_embedding(vector)),
                None => Err(IngestError::Worker {
                    segment_id: segment.id,
                    reason: "no embedding produced".to_string(),
                }),
            })
            .collect()
    }
}

/// Fail fast on inputs that can never produce a valid batch. Returns the
/// trimmed ids.
fn preflight(documents: &[RawDocument], entity_ids: &[String]) -> Result<Vec<String>, InputMismatch> {
    if documents.len() != entity_ids.len() {
        return Err(InputMismatch::CountMismatch {
            documents: documents.len(),
            entity_ids: entity_ids.len(),
        });
    }

    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(entity_ids.len());

    for (position, (doc, id)) in documents.iter().zip(entity_ids).enumerate() {
        let id = id.trim();
        if id.is_empty() {
            return Err(InputMismatch::BlankEntityId {
                position,
                source_name: doc.source_name.clone(),
            });
        }
        if !seen.insert(id) {
            return Err(InputMismatch::DuplicateEntityId {
                entity_id: id.to_string(),
            });
        }
        ids.push(id.to_string());
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str) -> RawDocument {
        RawDocument::new(name, b"text".to_vec())
    }

    #[test]
    fn test_preflight_trims_ids() {
        let ids = preflight(&[raw("a"), raw("b")], &[" A ".to_string(), "B".to_string()]).unwrap();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_preflight_count_mismatch() {
        assert_eq!(
            preflight(&[raw("a"), raw("b")], &["A".to_string()]),
            Err(InputMismatch::CountMismatch { documents: 2, entity_ids: 1 })
        );
    }

    #[test]
    fn test_preflight_blank_id() {
        assert_eq!(
            preflight(&[raw("a"), raw("b")], &["A".to_string(), "   ".to_string()]),
            Err(InputMismatch::BlankEntityId {
                position: 1,
                source_name: "b".to_string()
            })
        );
    }

    #[test]
    fn test_preflight_duplicate_after_trim() {
        assert_eq!(
            preflight(&[raw("a"), raw("b")], &["A".to_string(), " A".to_string()]),
            Err(InputMismatch::DuplicateEntityId { entity_id: "A".to_string() })
        );
    }

    #[test]
    fn test_empty_batch_passes_preflight() {
        assert_eq!(preflight(&[], &[]), Ok(Vec::new()));
    }
}
