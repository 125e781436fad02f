//! Error taxonomy for ingestion, indexing, retrieval and generation.
//!
//! Every variant names the document or segment it concerns so a caller can act
//! on it without inspecting internals.

use std::time::Duration;
use thiserror::Error;

/// Chunking parameters that cannot produce forward progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkConfigError {
    #[error("chunk_size must be at least 1")]
    ZeroChunkSize,

    #[error("chunk_size ({chunk_size}) must be greater than overlap ({overlap})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Chunking(#[from] ChunkConfigError),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("environment variable `{env}` holding the API key is not set")]
    MissingApiKey { env: String },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A per-document extraction failure. Never fatal to a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("text extraction failed: {0}")]
    Failed(String),
}

/// Failure reported by an embedding provider.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("embedding endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("embedding response was malformed: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Provider(String),
}

/// Failure reported by a generation provider. Passed through untouched.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation response was malformed: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Provider(String),
}

/// A provider call that exceeded its deadline. Retryable at the caller's discretion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} timed out after {after:?}")]
pub struct ProviderTimeout {
    pub operation: &'static str,
    pub after: Duration,
}

/// Vector index contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("segment `{segment_id}` has no embedding")]
    MissingEmbedding { segment_id: String },

    #[error("segment `{segment_id}` has an empty embedding")]
    EmptyEmbedding { segment_id: String },

    #[error("segment `{segment_id}` has dimension {got}, index expects {expected}")]
    DimensionMismatch {
        segment_id: String,
        expected: usize,
        got: usize,
    },

    #[error("query has dimension {got}, index expects {expected}")]
    QueryDimensionMismatch { expected: usize, got: usize },

    #[error("graph accelerator rejected segment `{segment_id}`: {reason}")]
    Graph { segment_id: String, reason: String },
}

/// Pre-flight validation failures of an ingestion request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputMismatch {
    #[error("{documents} documents but {entity_ids} entity ids")]
    CountMismatch { documents: usize, entity_ids: usize },

    #[error("entity id for document #{position} (`{source_name}`) is blank")]
    BlankEntityId { position: usize, source_name: String },

    #[error("entity id `{entity_id}` is used more than once")]
    DuplicateEntityId { entity_id: String },
}

/// Batch-level ingestion failure. Nothing is published when one is returned.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input mismatch: {0}")]
    InputMismatch(#[from] InputMismatch),

    #[error("embedding segment `{segment_id}` failed: {source}")]
    Embed {
        segment_id: String,
        #[source]
        source: EmbedError,
    },

    #[error("embedding segment `{segment_id}` timed out after {after:?}")]
    ProviderTimeout { segment_id: String, after: Duration },

    #[error("embedding worker for segment `{segment_id}` stopped: {reason}")]
    Worker { segment_id: String, reason: String },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("nothing to index: {documents} documents yielded no text ({failed} failed extraction)")]
    NoSegments { documents: usize, failed: usize },
}

impl IngestError {
    /// Only provider timeouts are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::ProviderTimeout { .. })
    }
}

/// Query-time retrieval failure.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("embedding the query failed: {0}")]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Timeout(#[from] ProviderTimeout),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl RetrieveError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetrieveError::Timeout(_))
    }
}

/// Failures of the screening workflows.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("prompt template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Timeout(#[from] ProviderTimeout),

    #[error("comparison needs at least two candidates, got {got}")]
    NotEnoughCandidates { got: usize },
}

impl AssistantError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AssistantError::Timeout(_) => true,
            AssistantError::Retrieve(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Session-level failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no resumes have been processed yet")]
    NoIndex,
}
