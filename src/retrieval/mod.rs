//! Query-time retrieval: classify the message, embed it, and fetch the nearest chunks.

pub mod classifier;

pub use classifier::{ClassifierError, DEFAULT_SUMMARY_PATTERNS, QueryClassifier, QueryKind};

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::store::{ScoredChunk, StoreError, VectorStore};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while retrieving chunks for a query.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query could not be embedded.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The store lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Number of chunks fetched per query kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalLimits {
    /// K for targeted questions.
    pub targeted: usize,
    /// K for summarization requests.
    pub summary: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            targeted: 3,
            summary: 15,
        }
    }
}

impl RetrievalLimits {
    /// Limit applied to a query of the given kind.
    pub fn for_kind(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Summarization => self.summary,
            QueryKind::Targeted => self.targeted,
        }
    }
}

/// Embeds queries and looks up an owner's nearest chunks.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    limits: RetrievalLimits,
}

impl Retriever {
    /// Wire a retriever over shared embedding and storage handles.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        limits: RetrievalLimits,
    ) -> Self {
        Self {
            embedder,
            store,
            limits,
        }
    }

    /// Limits in force.
    pub fn limits(&self) -> RetrievalLimits {
        self.limits
    }

    /// Fetch the owner's chunks nearest to `query`, in ascending distance.
    ///
    /// An empty result is a valid outcome. An empty query embedding is an embedding error.
    pub async fn retrieve(
        &self,
        owner_id: &str,
        query: &str,
        kind: QueryKind,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let vector = self.embedder.embed(query).await?;
        if vector.is_empty() {
            return Err(EmbeddingClientError::EmptyResponse.into());
        }
        let limit = self.limits.for_kind(kind);
        let chunks = self.store.query_nearest(owner_id, &vector, limit).await?;
        tracing::debug!(owner_id, ?kind, limit, hits = chunks.len(), "Retrieved chunks");
        Ok(chunks)
    }
}
