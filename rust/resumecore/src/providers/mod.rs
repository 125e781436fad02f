//! Collaborators behind the retrieval core
//!
//! Text extraction, embedding and generation are traits so the pipeline never
//! depends on a concrete backend. A backend is picked once from configuration
//! (see [`crate::config::EmbeddingBackend`]); there is no runtime fallback.

use async_trait::async_trait;

use crate::error::{EmbedError, ExtractError, GenerationError};
use crate::rag::document::Page;

mod hashing;
mod openai;
mod plain_text;

pub use hashing::HashingEmbedder;
pub use openai::{OpenAiChatGenerator, OpenAiEmbedder};
pub use plain_text::PlainTextExtractor;

/// Turns a raw document into pages of text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, source_name: &str, blob: &[u8]) -> Result<Vec<Page>, ExtractError>;
}

/// Text to a fixed-length vector. Must be deterministic for a given instance.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Prompt in, answer out.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
