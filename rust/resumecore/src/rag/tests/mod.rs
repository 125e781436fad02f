//! Scenario tests for the retrieval core, with canned providers.


use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{EmbedError, ExtractError};
use crate::providers::{EmbeddingProvider, HashingEmbedder, PlainTextExtractor, TextExtractor};
use crate::rag::document::{Page, RawDocument};
use crate::rag::pipeline::Pipeline;

/// Hashing embedder with scripted misbehaviour keyed on text markers.
pub(crate) struct ScriptedEmbedder {
    inner: HashingEmbedder,
    fail_on: Option<&'static str>,
    stall_on: Option<&'static str>,
    short_on: Option<&'static str>,
    /// Finish shorter texts later, so completion order inverts input order.
    reverse_by_length: bool,
    work: Duration,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashingEmbedder::default(),
            fail_on: None,
            stall_on: None,
            short_on: None,
            reverse_by_length: false,
            work: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_on(mut self, marker: &'static str) -> Self {
        self.fail_on = Some(marker);
        self
    }

    pub fn stall_on(mut self, marker: &'static str) -> Self {
        self.stall_on = Some(marker);
        self
    }

    pub fn short_on(mut self, marker: &'static str) -> Self {
        self.short_on = Some(marker);
        self
    }

    pub fn reverse_by_length(mut self) -> Self {
        self.reverse_by_length = true;
        self
    }

    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let mut delay = self.work;
        if self.reverse_by_length {
            delay += Duration::from_millis(200u64.saturating_sub(text.len() as u64));
        }
        if self.stall_on.is_some_and(|m| text.contains(m)) {
            delay += Duration::from_secs(3600);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.is_some_and(|m| text.contains(m)) {
            return Err(EmbedError::Provider("model overloaded".to_string()));
        }
        if self.short_on.is_some_and(|m| text.contains(m)) {
            return Ok(vec![1.0, 0.0, 0.0]);
        }
        Ok(self.inner.embed_sync(text))
    }
}

/// Plain-text extractor that counts calls and rejects names containing "corrupt".
pub(crate) struct CountingExtractor {
    pub calls: AtomicUsize,
}

impl CountingExtractor {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl TextExtractor for CountingExtractor {
    fn extract(&self, source_name: &str, blob: &[u8]) -> Result<Vec<Page>, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if source_name.contains("corrupt") {
            return Err(ExtractError::Failed(format!("cannot parse {source_name}")));
        }
        PlainTextExtractor.extract(source_name, blob)
    }
}

pub(crate) fn doc(name: &str, text: &str) -> RawDocument {
    RawDocument::new(name, text.as_bytes().to_vec())
}

pub(crate) fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn pipeline_with(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Pipeline {
    Pipeline::new(config, Arc::new(PlainTextExtractor), embedder).unwrap()
}

pub(crate) fn hashing_pipeline() -> Pipeline {
    pipeline_with(&RagConfig::default(), Arc::new(HashingEmbedder::default()))
}

/// The two-candidate corpus used across scenarios.
pub(crate) fn python_and_java() -> (Vec<RawDocument>, Vec<String>) {
    (
        vec![
            doc("a.txt", "Python developer with 5 years experience"),
            doc("b.txt", "Java developer with 2 years experience"),
        ],
        ids(&["A", "B"]),
    )
}
