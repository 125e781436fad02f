//! ResumeCore: Resume Retrieval Engine
//!
//! Chunks candidate resumes, embeds and indexes the chunks, and retrieves
//! them for screening questions, job matching and candidate comparison.
//!
//! # Architecture
//!
//! ## Retrieval Core (`rag`)
//! - `chunker.rs` - Chunker: overlapping character windows with provenance
//! - `index.rs` - VectorIndex: exact scan, entity postings, optional HNSW
//! - `filter.rs` - MetadataFilter: hard constraints on segment metadata
//! - `retriever.rs` - Retriever: top-k by query, all segments by entity
//! - `pipeline.rs` - Pipeline: extract → chunk → embed → index
//! - `session.rs` - Session: atomically published index versions
//!
//! ## Collaborators
//! - `providers` - extractor, embedding and generation traits plus backends
//! - `assistant` - analysis, job matching and comparison workflows
//! - `hnsw` - graph accelerator used by the index for large corpora
//!
//! # Usage
//! ```ignore
//! let config = RagConfig::load("resumecore.json")?;
//! let session = Session::new(Pipeline::from_config(&config)?);
//!
//! session
//!     .ingest(vec![RawDocument::new("alice.txt", bytes)], &["alice".to_string()])
//!     .await?;
//!
//! let retriever = session.retriever()?;
//! let top = retriever.retrieve_by_query("Python developer", 5).await?;
//! let alice = retriever.retrieve_by_entity_ids(&["alice"], 100);
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod hnsw;
pub mod providers;
pub mod rag;

pub use assistant::{AssistantAnswer, PromptTemplate, ScreeningAssistant};
pub use config::RagConfig;
pub use error::*;
pub use providers::{EmbeddingProvider, GenerationProvider, TextExtractor};
pub use rag::*;

/// Get version information
pub fn version() -> String {
    format!("resumecore v{}", env!("CARGO_PKG_VERSION"))
}
