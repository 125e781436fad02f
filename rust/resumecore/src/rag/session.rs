//! Session - owner of the one published index
//!
//! Ingestion builds a complete index off to the side and publishes it by
//! swapping an `Arc`. Readers clone the `Arc` when their call starts and keep
//! using that version even if a newer one is published meanwhile.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::error::{IngestError, SessionError};

use super::document::RawDocument;
use super::index::VectorIndex;
use super::pipeline::{DocumentFailure, IngestStats, Pipeline};
use super::retriever::Retriever;

/// One published index version.
#[derive(Debug, Serialize)]
pub struct IndexSnapshot {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    /// Processed entity ids, upload order.
    pub entity_ids: Vec<String>,
    #[serde(skip)]
    pub index: Arc<VectorIndex>,
    pub stats: IngestStats,
}

/// What a successful [`Session::ingest`] reports back.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub snapshot: Arc<IndexSnapshot>,
    pub failures: Vec<DocumentFailure>,
}

pub struct Session {
    pipeline: Pipeline,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    next_version: AtomicU64,
}

impl Session {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            current: RwLock::new(None),
            next_version: AtomicU64::new(1),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Process a batch and, if it succeeds, replace the published index.
    ///
    /// On error the previous index stays published and untouched. Dropping
    /// the returned future before it completes publishes nothing.
    pub async fn ingest(&self, documents: Vec<RawDocument>, entity_ids: &[String]) -> Result<IngestReport, IngestError> {
        let outcome = self.pipeline.ingest(documents, entity_ids).await?;

        let index = Arc::new(outcome.index);

        // version is taken under the write lock so published versions only grow
        let snapshot = {
            let mut current = self.current.write();
            let snapshot = Arc::new(IndexSnapshot {
                version: self.next_version.fetch_add(1, Ordering::Relaxed),
                built_at: Utc::now(),
                entity_ids: outcome.entity_ids,
                index,
                stats: outcome.stats,
            });
            *current = Some(snapshot.clone());
            snapshot
        };
        info!(version = snapshot.version, segments = snapshot.index.len(), "published index");

        Ok(IngestReport {
            snapshot,
            failures: outcome.failures,
        })
    }

    /// The published snapshot, if any.
    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.read().clone()
    }

    /// A retriever pinned to the currently published index.
    pub fn retriever(&self) -> Result<Retriever, SessionError> {
        let snapshot = self.current().ok_or(SessionError::NoIndex)?;
        Ok(Retriever::new(
            snapshot.index.clone(),
            self.pipeline.embedder().clone(),
            self.pipeline.provider_timeout(),
        ))
    }

    /// Entity ids of the published index, empty before the first ingest.
    pub fn processed_entity_ids(&self) -> Vec<String> {
        self.current()
            .map(|s| s.entity_ids.clone())
            .unwrap_or_default()
    }

    /// Drop the published index.
    pub fn clear(&self) {
        *self.current.write() = None;
    }
}
