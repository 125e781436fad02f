//! RAG core - resume chunking, indexing and retrieval
//!
//! # Architecture
//! ```text
//! RawDocument → TextExtractor → Chunker (1000 chars, 200 overlap)
//!                                   ↓
//!                     EmbeddingProvider (bounded workers)
//!                                   ↓
//!                     VectorIndex → Session (published Arc)
//!                                        ↓
//! Query → EmbeddingProvider → Retriever → Top-K / per-entity segments
//! ```

pub mod chunker;
pub mod document;
pub mod filter;
pub mod index;
pub mod pipeline;
pub mod retriever;
pub mod session;

pub use chunker::{Chunker, PageChunk};
pub use document::{Document, Page, RawDocument, SearchHit, Segment, SegmentMetadata};
pub use filter::{FilterBuilder, MetadataFilter};
pub use index::VectorIndex;
pub use pipeline::{DocumentFailure, IngestOutcome, IngestStats, Pipeline};
pub use retriever::Retriever;
pub use session::{IndexSnapshot, IngestReport, Session};

#[cfg(test)]
mod tests;
