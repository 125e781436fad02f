//! Documents, pages and the segments cut from them.

use serde::{Deserialize, Serialize};

/// An uploaded file before text extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub source_name: String,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(source_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source_name: source_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// One page of extracted text. Page numbers come from the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub text: String,
    pub page_number: u32,
}

impl Page {
    pub fn new(text: impl Into<String>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            page_number,
        }
    }
}

/// An extracted document, owned by one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_name: String,
    pub entity_id: String,
    /// Label shown to users, e.g. "Applicant 2".
    pub display_name: String,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(
        source_name: impl Into<String>,
        entity_id: impl Into<String>,
        display_name: impl Into<String>,
        pages: Vec<Page>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            entity_id: entity_id.into(),
            display_name: display_name.into(),
            pages,
        }
    }
}

/// Provenance of a segment. Filters only ever look at this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub entity_id: String,
    pub display_name: String,
    pub source_name: String,
    pub page_number: u32,
    /// Position within its page
    pub chunk_index: usize,
    /// Char offset into the page text
    pub start: usize,
    /// Char offset into the page text (exclusive)
    pub end: usize,
}

/// The unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub text: String,
    pub metadata: SegmentMetadata,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Vec<f32>>,
}

impl Segment {
    pub fn entity_id(&self) -> &str {
        &self.metadata.entity_id
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A search result. Lower distance is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub segment: Segment,
    pub distance: f32,
}
