use crate::chunking::{DEFAULT_CHUNK_SIZE, types::default_overlap};
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_COLLECTION_NAME: &str = "rusty-rag";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TARGETED_LIMIT: usize = 3;
const DEFAULT_SUMMARY_LIMIT: usize = 15;
const DEFAULT_HISTORY_WINDOW: usize = 5;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was installed more than once.
    #[error("Configuration has already been initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the Rusty RAG server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend that stores chunk vectors.
    pub vector_store: VectorStoreBackend,
    /// Base URL of the Qdrant instance (required for the Qdrant backend).
    pub qdrant_url: Option<String>,
    /// Name of the Qdrant collection used for chunk storage.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Provider used for text generation.
    pub generation_provider: GenerationProvider,
    /// Generation model identifier passed to the provider.
    pub generation_model: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Bearer token for the OpenAI-compatible API.
    pub openai_api_key: Option<String>,
    /// Target chunk size in characters.
    pub text_splitter_chunk_size: usize,
    /// Optional overlap override; defaults to 15% of the chunk size.
    pub text_splitter_chunk_overlap: Option<usize>,
    /// Number of chunks retrieved for targeted questions.
    pub retrieval_targeted_limit: usize,
    /// Number of chunks retrieved for summarization requests.
    pub retrieval_summary_limit: usize,
    /// Number of recent conversation turns folded into prompts.
    pub history_window: usize,
    /// Optional replacement for the built-in summarization patterns.
    pub summary_patterns: Option<Vec<String>>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorStoreBackend {
    /// Qdrant over its HTTP API.
    Qdrant,
    /// Process-local store; contents vanish on restart.
    Memory,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic hashing embedder that needs no provider.
    Local,
}

/// Supported generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible chat completions API.
    OpenAI,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup (used by tests and tools).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required =
            |key: &str| optional(key).ok_or_else(|| ConfigError::MissingVariable(key.into()));

        let vector_store = match optional("VECTOR_STORE") {
            Some(value) => value
                .parse::<VectorStoreBackend>()
                .map_err(|()| ConfigError::InvalidValue("VECTOR_STORE".into()))?,
            None => VectorStoreBackend::Qdrant,
        };
        let qdrant_url = optional("QDRANT_URL");
        if vector_store == VectorStoreBackend::Qdrant && qdrant_url.is_none() {
            return Err(ConfigError::MissingVariable("QDRANT_URL".into()));
        }

        let embedding_provider = required("EMBEDDING_PROVIDER")?
            .parse::<EmbeddingProvider>()
            .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?;
        let generation_provider = match optional("GENERATION_PROVIDER") {
            Some(value) => value
                .parse::<GenerationProvider>()
                .map_err(|()| ConfigError::InvalidValue("GENERATION_PROVIDER".into()))?,
            None => GenerationProvider::Ollama,
        };

        let openai_api_key = optional("OPENAI_API_KEY");
        let needs_openai_key = embedding_provider == EmbeddingProvider::OpenAI
            || generation_provider == GenerationProvider::OpenAI;
        if needs_openai_key && openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        let embedding_dimension: usize = parse_required(&required, "EMBEDDING_DIMENSION")?;
        if embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }

        let text_splitter_chunk_size: usize =
            parse_optional(&optional, "TEXT_SPLITTER_CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE);
        if text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        let text_splitter_chunk_overlap: Option<usize> = parse_optional(&optional, "TEXT_SPLITTER_CHUNK_OVERLAP")?;
        if text_splitter_chunk_overlap.is_some_and(|overlap| overlap >= text_splitter_chunk_size) {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_OVERLAP".into()));
        }

        let retrieval_targeted_limit = parse_optional(&optional, "RETRIEVAL_TARGETED_LIMIT")?
            .unwrap_or(DEFAULT_TARGETED_LIMIT)
            .max(1);
        let retrieval_summary_limit = parse_optional(&optional, "RETRIEVAL_SUMMARY_LIMIT")?
            .unwrap_or(DEFAULT_SUMMARY_LIMIT)
            .max(1);
        let history_window =
            parse_optional(&optional, "HISTORY_WINDOW")?.unwrap_or(DEFAULT_HISTORY_WINDOW);

        let summary_patterns = optional("SUMMARY_PATTERNS").map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|pattern| !pattern.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Ok(Self {
            vector_store,
            qdrant_url,
            qdrant_collection_name: optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            qdrant_api_key: optional("QDRANT_API_KEY"),
            embedding_provider,
            embedding_model: required("EMBEDDING_MODEL")?,
            embedding_dimension,
            generation_provider,
            generation_model: required("GENERATION_MODEL")?,
            ollama_url: optional("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_api_key,
            text_splitter_chunk_size,
            text_splitter_chunk_overlap,
            retrieval_targeted_limit,
            retrieval_summary_limit,
            history_window,
            summary_patterns,
            server_port: parse_optional(&optional, "SERVER_PORT")?,
        })
    }

    /// Overlap actually applied by the splitter.
    pub fn effective_chunk_overlap(&self) -> usize {
        self.text_splitter_chunk_overlap
            .unwrap_or_else(|| default_overlap(self.text_splitter_chunk_size))
    }
}

fn parse_required<T, R>(required: &R, key: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    R: Fn(&str) -> Result<String, ConfigError>,
{
    required(key)?
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_optional<T, O>(optional: &O, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    O: Fn(&str) -> Option<String>,
{
    optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for VectorStoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, if [`init_config`] has run.
pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        vector_store = ?config.vector_store,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        generation_provider = ?config.generation_provider,
        generation_model = %config.generation_model,
        chunk_size = config.text_splitter_chunk_size,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("VECTOR_STORE", "memory"),
        ("EMBEDDING_PROVIDER", "local"),
        ("EMBEDDING_MODEL", "hash"),
        ("EMBEDDING_DIMENSION", "64"),
        ("GENERATION_MODEL", "llama3.1"),
    ];

    #[test]
    fn minimal_configuration_uses_defaults() {
        let config = Config::from_lookup(lookup(MINIMAL)).expect("config");
        assert_eq!(config.vector_store, VectorStoreBackend::Memory);
        assert_eq!(config.generation_provider, GenerationProvider::Ollama);
        assert_eq!(config.text_splitter_chunk_size, 1200);
        assert_eq!(config.effective_chunk_overlap(), 180);
        assert_eq!(config.retrieval_targeted_limit, 3);
        assert_eq!(config.retrieval_summary_limit, 15);
        assert_eq!(config.history_window, 5);
        assert_eq!(config.qdrant_collection_name, "rusty-rag");
        assert!(config.summary_patterns.is_none());
    }

    #[test]
    fn qdrant_backend_requires_url() {
        let mut pairs = MINIMAL.to_vec();
        pairs.retain(|(key, _)| *key != "VECTOR_STORE");
        let error = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(key) if key == "QDRANT_URL"));
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("GENERATION_PROVIDER", "openai"));
        let error = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(key) if key == "OPENAI_API_KEY"));
    }

    #[test]
    fn overlap_must_fit_inside_chunk() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("TEXT_SPLITTER_CHUNK_SIZE", "100"));
        pairs.push(("TEXT_SPLITTER_CHUNK_OVERLAP", "100"));
        let error = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(key) if key == "TEXT_SPLITTER_CHUNK_OVERLAP"));
    }

    #[test]
    fn summary_patterns_are_comma_separated() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("SUMMARY_PATTERNS", r"\brecap\b, \btl;dr\b ,"));
        let config = Config::from_lookup(lookup(&pairs)).expect("config");
        assert_eq!(
            config.summary_patterns,
            Some(vec![r"\brecap\b".to_string(), r"\btl;dr\b".to_string()])
        );
    }

    #[test]
    fn rejects_unknown_provider() {
        let mut pairs = MINIMAL.to_vec();
        pairs.retain(|(key, _)| *key != "EMBEDDING_PROVIDER");
        pairs.push(("EMBEDDING_PROVIDER", "bogus"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidValue(key)) if key == "EMBEDDING_PROVIDER"
        ));
    }
}
