//! Embedding client abstraction and adapters.
//!
//! Providers only see trimmed, non-empty text: [`EmbeddingClient::embed`] short-circuits blank
//! input to an empty vector without a network round trip.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached or refused the request outright.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with an error status.
    #[error("Failed to generate embeddings: {0}")]
    RequestFailed(String),
    /// Provider answered successfully but returned no vector.
    #[error("Embedding provider returned no data")]
    EmptyResponse,
    /// Provider response could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed one piece of text. Blank input yields an empty vector without calling the provider.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let content = text.trim();
        if content.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_non_empty(content).await
    }

    /// Provider call for trimmed, non-empty text.
    async fn embed_non_empty(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;
}

/// Deterministic embedding client that hashes bytes into a normalized vector.
///
/// Useful offline and in tests; similar texts land close together only in the loosest sense.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a hashing client producing vectors of `dimension` entries.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() || dimension == 0 {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            // Basic hashing of content into the vector slot
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn embed_non_empty(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::RequestFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self::encode(text, self.dimension))
    }
}

/// Embedding client for the Ollama `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Construct a client targeting `base_url` with the given model.
    pub fn new(base_url: String, model: String) -> Result<Self, EmbeddingClientError> {
        Ok(Self {
            http: build_http_client("rusty-rag/embed")?,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed_non_empty(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        tracing::trace!(model = %self.model, chars = text.len(), "Requesting Ollama embedding");
        let response = self
            .http
            .post(self.endpoint())
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::RequestFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        body.embeddings
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or(EmbeddingClientError::EmptyResponse)
    }
}

/// Embedding client for OpenAI-compatible `/v1/embeddings` endpoints.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    /// Construct a client targeting `base_url` with the given credentials and model.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
    ) -> Result<Self, EmbeddingClientError> {
        Ok(Self {
            http: build_http_client("rusty-rag/embed")?,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed_non_empty(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": text,
                "encoding_format": "float",
            }))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::RequestFailed(format!(
                "embeddings endpoint returned {status}: {body}"
            )));
        }

        let body: OpenAiEmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode embeddings response: {error}"
            ))
        })?;

        body.data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|vector| !vector.is_empty())
            .ok_or(EmbeddingClientError::EmptyResponse)
    }
}

fn build_http_client(user_agent: &str) -> Result<Client, EmbeddingClientError> {
    Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))
}

/// Build the embedding client selected by the configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Building embedding client"
    );
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Local => Arc::new(HashEmbeddingClient::new(config.embedding_dimension)),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
        )?),
        EmbeddingProvider::OpenAI => Arc::new(OpenAiEmbeddingClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
            config.embedding_model.clone(),
        )?),
    };
    Ok(client)
}
