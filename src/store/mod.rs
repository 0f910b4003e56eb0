//! Owner-scoped vector storage for chunks.
//!
//! Every operation takes the owner identifier; no call can read or delete another owner's rows.

pub mod filters;
pub mod memory;
pub mod payload;
pub mod qdrant;
/// Streaming helpers for Qdrant scroll pagination.
pub mod scroller;
pub mod types;

pub use memory::InMemoryStore;
pub use payload::compute_chunk_hash;
pub use qdrant::QdrantStore;
pub use types::{ChunkInsert, DocumentSummary, ScoredChunk, StoreError};

use crate::config::{Config, VectorStoreBackend};
use async_trait::async_trait;
use std::sync::Arc;

/// Interface implemented by chunk storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store one chunk and return its assigned identifier.
    async fn insert(&self, chunk: ChunkInsert) -> Result<String, StoreError>;

    /// Return at most `limit` of the owner's chunks, nearest first.
    async fn query_nearest(
        &self,
        owner_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    /// One summary per source file owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentSummary>, StoreError>;

    /// Delete every chunk of `source_file` owned by `owner_id`; returns the number removed.
    async fn delete_by_source_file(
        &self,
        owner_id: &str,
        source_file: &str,
    ) -> Result<usize, StoreError>;
}

/// Build the store selected by the configuration, creating the Qdrant collection if needed.
pub async fn build_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>, StoreError> {
    match config.vector_store {
        VectorStoreBackend::Memory => {
            tracing::warn!("Using in-memory vector store; documents are lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        VectorStoreBackend::Qdrant => {
            let url = config
                .qdrant_url
                .as_deref()
                .ok_or_else(|| StoreError::InvalidUrl("QDRANT_URL is not set".into()))?;
            let store = QdrantStore::connect(
                url,
                config.qdrant_api_key.clone(),
                &config.qdrant_collection_name,
                config.embedding_dimension,
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
