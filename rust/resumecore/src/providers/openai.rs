//! Clients for OpenAI-compatible HTTP endpoints (OpenAI, Groq, local servers).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ChatConfig, OpenAiEmbeddingConfig};
use crate::error::{ConfigError, EmbedError, GenerationError};

use super::{EmbeddingProvider, GenerationProvider};

fn build_client(api_key: &str) -> Result<Client, ConfigError> {
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key.trim());
    let value = HeaderValue::from_str(&auth).map_err(|e| ConfigError::Invalid {
        field: "api_key",
        reason: e.to_string(),
    })?;
    headers.insert(AUTHORIZATION, value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    // Deadlines are applied per call by the pipeline, not here.
    Ok(Client::builder().default_headers(headers).build()?)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Embeddings client for `POST {base_url}/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    request_dimensions: bool,
}

impl OpenAiEmbedder {
    pub fn new(config: &OpenAiEmbeddingConfig, api_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(api_key)?,
            endpoint: endpoint(&config.base_url, "embeddings"),
            model: config.model.clone(),
            dimensions: config.dimensions,
            request_dimensions: config.request_dimensions,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.model,
            input: [text],
            dimensions: self.request_dimensions.then_some(self.dimensions),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let request = self.request(text);
        let resp = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = resp.json().await?;
        let vector = first_embedding(parsed)?;
        if vector.len() != self.dimensions {
            return Err(EmbedError::InvalidResponse(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                vector.len()
            )));
        }

        debug!(model = %self.model, chars = text.chars().count(), "embedded text");
        Ok(vector)
    }
}

fn first_embedding(response: EmbeddingResponse) -> Result<Vec<f32>, EmbedError> {
    response
        .data
        .into_iter()
        .min_by_key(|entry| entry.index)
        .map(|entry| entry.embedding)
        .ok_or_else(|| EmbedError::InvalidResponse("no embedding in response".to_string()))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Chat completion client for `POST {base_url}/chat/completions`.
///
/// The prompt goes out as a single user message, as the screening workflows
/// put everything (context and instructions) in one rendered template.
#[derive(Debug, Clone)]
pub struct OpenAiChatGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiChatGenerator {
    pub fn new(config: &ChatConfig, api_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(api_key)?,
            endpoint: endpoint(&config.base_url, "chat/completions"),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationProvider for OpenAiChatGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        first_answer(parsed)
    }
}

fn first_answer(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::InvalidResponse("no choices in response".to_string()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}
