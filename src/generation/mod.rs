//! Text generation clients used by the answering pipeline.
//!
//! Both adapters issue plain HTTP requests through `reqwest`: the Ollama client targets
//! `/api/generate` with streaming disabled, the OpenAI-compatible client targets
//! `/v1/chat/completions` with a single user message.

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while generating text.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider could not be reached.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Sampling options forwarded to the provider; unset values use the provider default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff.
    pub top_p: Option<f32>,
}

impl GenerationOptions {
    /// Options with only the temperature set.
    pub const fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            top_p: None,
        }
    }

    fn to_json(self) -> Map<String, Value> {
        let mut options = Map::new();
        if let Some(temperature) = self.temperature {
            options.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = self.top_p {
            options.insert("top_p".into(), json!(top_p));
        }
        options
    }
}

/// Interface implemented by text generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce one completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationClientError>;
}

/// Build the generation client selected by the configuration.
pub fn build_generation_client(
    config: &Config,
) -> Result<Arc<dyn GenerationClient>, GenerationClientError> {
    tracing::debug!(
        provider = ?config.generation_provider,
        model = %config.generation_model,
        "Building generation client"
    );
    let client: Arc<dyn GenerationClient> = match config.generation_provider {
        GenerationProvider::Ollama => Arc::new(OllamaGenerationClient::new(
            config.ollama_url.clone(),
            config.generation_model.clone(),
        )?),
        GenerationProvider::OpenAI => Arc::new(OpenAiGenerationClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
            config.generation_model.clone(),
        )?),
    };
    Ok(client)
}

fn build_http_client() -> Result<Client, GenerationClientError> {
    Client::builder()
        .user_agent("rusty-rag/generate")
        .build()
        .map_err(|error| GenerationClientError::ProviderUnavailable(error.to_string()))
}

/// Generation client for the Ollama `/api/generate` endpoint.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerationClient {
    /// Construct a client targeting `base_url` with the given model.
    pub fn new(base_url: String, model: String) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: build_http_client()?,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options.to_json(),
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

/// Generation client for OpenAI-compatible `/v1/chat/completions` endpoints.
pub struct OpenAiGenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerationClient {
    /// Construct a client targeting `base_url` with the given credentials and model.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
    ) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: build_http_client()?,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationClientError> {
        let mut payload = options.to_json();
        payload.insert("model".into(), json!(self.model));
        payload.insert(
            "messages".into(),
            json!([{ "role": "user", "content": prompt }]),
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "chat completions returned {status}: {body}"
            )));
        }

        let body: ChatCompletion = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                GenerationClientError::InvalidResponse("completion carried no choices".into())
            })
    }
}
