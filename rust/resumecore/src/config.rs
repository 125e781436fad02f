//! Configuration for the screening pipeline.
//!
//! Every section has a `Default` (1000/200 chunking, 10 MiB documents, k = 5
//! for analysis and k = 10 for job matching), so an empty JSON object is a
//! valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ChunkConfigError, ConfigError};
use crate::hnsw::distance::Metric;
use crate::providers::{
    EmbeddingProvider, GenerationProvider, HashingEmbedder, OpenAiChatGenerator, OpenAiEmbedder,
};
use crate::rag::chunker::Chunker;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingBackend,
    pub generation: GenerationBackend,
}

impl RagConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RagConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Reject values that would only fail later, mid-ingest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.chunker()?;

        if let Some(ann) = &self.index.ann {
            if ann.m < 2 {
                return Err(invalid("index.ann.m", "must be at least 2"));
            }
            if ann.ef_construction == 0 {
                return Err(invalid("index.ann.ef_construction", "must be at least 1"));
            }
        }

        if self.ingest.max_document_bytes == 0 {
            return Err(invalid("ingest.max_document_bytes", "must be at least 1"));
        }
        if self.ingest.embed_concurrency == 0 {
            return Err(invalid("ingest.embed_concurrency", "must be at least 1"));
        }
        if self.ingest.provider_timeout_ms == 0 {
            return Err(invalid("ingest.provider_timeout_ms", "must be at least 1"));
        }

        if self.retrieval.default_k == 0 {
            return Err(invalid("retrieval.default_k", "must be at least 1"));
        }
        if self.retrieval.match_k == 0 {
            return Err(invalid("retrieval.match_k", "must be at least 1"));
        }
        if self.retrieval.per_entity_cap == 0 {
            return Err(invalid("retrieval.per_entity_cap", "must be at least 1"));
        }

        match &self.embedding {
            EmbeddingBackend::Hashing { dimensions } if *dimensions == 0 => {
                return Err(invalid("embedding.dimensions", "must be at least 1"));
            }
            EmbeddingBackend::OpenAi(cfg) => {
                if cfg.dimensions == 0 {
                    return Err(invalid("embedding.dimensions", "must be at least 1"));
                }
                check_endpoint("embedding", &cfg.base_url, &cfg.model)?;
            }
            _ => {}
        }

        if let GenerationBackend::OpenAi(cfg) = &self.generation {
            check_endpoint("generation", &cfg.base_url, &cfg.model)?;
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn check_endpoint(section: &'static str, base_url: &str, model: &str) -> Result<(), ConfigError> {
    if base_url.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: section,
            reason: "base_url is empty".to_string(),
        });
    }
    if model.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: section,
            reason: "model is empty".to_string(),
        });
    }
    Ok(())
}

/// Character-based chunking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn chunker(&self) -> Result<Chunker, ChunkConfigError> {
        Chunker::new(self.chunk_size, self.overlap)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub metric: Metric,
    /// Graph accelerator for large corpora. `None` keeps every search exact.
    pub ann: Option<AnnConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnConfig {
    /// Max neighbors per node per layer
    pub m: usize,
    pub ef_construction: usize,
    /// Below this many segments the exact scan is used even when the graph exists.
    pub min_points: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 100,
            min_points: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_document_bytes: usize,
    /// In-flight embedding calls during ingest.
    pub embed_concurrency: usize,
    pub provider_timeout_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 10 * 1024 * 1024,
            embed_concurrency: 16,
            provider_timeout_ms: 30_000,
        }
    }
}

impl IngestConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Segments retrieved for a free-form question.
    pub default_k: usize,
    /// Segments pulled per candidate for comparisons.
    pub per_entity_cap: usize,
    /// Segments retrieved for a job description.
    pub match_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            per_entity_cap: 100,
            match_k: 10,
        }
    }
}

/// Embedding backend, chosen once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Offline feature hashing, no network.
    Hashing {
        #[serde(default = "default_hashing_dimensions")]
        dimensions: usize,
    },
    #[serde(rename = "openai")]
    OpenAi(OpenAiEmbeddingConfig),
}

fn default_hashing_dimensions() -> usize {
    384
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        EmbeddingBackend::Hashing {
            dimensions: default_hashing_dimensions(),
        }
    }
}

impl EmbeddingBackend {
    pub fn build(&self) -> Result<Arc<dyn EmbeddingProvider>, ConfigError> {
        match self {
            EmbeddingBackend::Hashing { dimensions } => Ok(Arc::new(HashingEmbedder::new(*dimensions))),
            EmbeddingBackend::OpenAi(cfg) => {
                let api_key = read_api_key(&cfg.api_key_env)?;
                Ok(Arc::new(OpenAiEmbedder::new(cfg, &api_key)?))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiEmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// Length of the vectors the model returns. Every response is checked.
    pub dimensions: usize,
    /// Send `dimensions` with each request so the model shortens its
    /// vectors. Off by default: `text-embedding-ada-002` and many
    /// compatible servers reject the field.
    pub request_dimensions: bool,
    /// Name of the environment variable holding the key.
    pub api_key_env: String,
}

impl Default for OpenAiEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            request_dimensions: false,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Generation backend. `Disabled` leaves the crate usable for retrieval only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationBackend {
    Disabled,
    #[serde(rename = "openai")]
    OpenAi(ChatConfig),
}

impl Default for GenerationBackend {
    fn default() -> Self {
        GenerationBackend::OpenAi(ChatConfig::default())
    }
}

impl GenerationBackend {
    pub fn build(&self) -> Result<Option<Arc<dyn GenerationProvider>>, ConfigError> {
        match self {
            GenerationBackend::Disabled => Ok(None),
            GenerationBackend::OpenAi(cfg) => {
                let api_key = read_api_key(&cfg.api_key_env)?;
                Ok(Some(Arc::new(OpenAiChatGenerator::new(cfg, &api_key)?)))
            }
        }
    }
}

/// OpenAI-compatible chat completion endpoint. Defaults point at Groq.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub api_key_env: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "deepseek-r1-distill-qwen-32b".to_string(),
            temperature: 0.0,
            max_tokens: None,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

fn read_api_key(env: &str) -> Result<String, ConfigError> {
    match std::env::var(env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingApiKey { env: env.to_string() }),
    }
}
