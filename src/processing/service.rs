//! Document service coordinating chunking, embedding, and vector store writes.

use crate::{
    chunking::{SourceMetadata, SplitOptions, split_text},
    embedding::{EmbeddingClient, EmbeddingClientError},
    metrics::PipelineMetrics,
    processing::types::{
        DeleteOutcome, IngestError, IngestOutcome, RawDocument, StructureEntry,
        is_supported_media_type,
    },
    store::{ChunkInsert, DocumentSummary, VectorStore},
};
use std::sync::Arc;

/// Chunk budget applied to every ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBudget {
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters.
    pub chunk_overlap: usize,
}

/// Owns the ingestion pipeline: split, embed and store, one chunk at a time.
///
/// Construct once near process start and share through an `Arc`.
pub struct DocumentService {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    budget: ChunkBudget,
    metrics: Arc<PipelineMetrics>,
}

fn require_owner(owner_id: &str) -> Result<&str, IngestError> {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        Err(IngestError::MissingOwner)
    } else {
        Ok(owner_id)
    }
}

impl DocumentService {
    /// Wire the service over shared embedding and storage handles.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        budget: ChunkBudget,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            embedder,
            store,
            budget,
            metrics,
        }
    }

    /// Budget used when splitting documents.
    pub fn budget(&self) -> ChunkBudget {
        self.budget
    }

    /// Split, embed and store a document.
    ///
    /// Chunks are embedded and inserted sequentially in position order; a failure part way
    /// leaves the chunks written so far in place.
    pub async fn ingest(&self, document: RawDocument) -> Result<IngestOutcome, IngestError> {
        let owner_id = require_owner(&document.owner_id)?;
        let source_file = document.filename.trim();
        if source_file.is_empty() {
            return Err(IngestError::MissingFilename);
        }
        if !is_supported_media_type(&document.media_type) {
            return Err(IngestError::UnsupportedMediaType(document.media_type.clone()));
        }
        if document.text.trim().is_empty() {
            return Err(IngestError::EmptyDocument);
        }

        let options = SplitOptions {
            chunk_size: self.budget.chunk_size,
            chunk_overlap: Some(self.budget.chunk_overlap),
            metadata: SourceMetadata {
                source: Some(source_file.to_string()),
                source_id: Some(format!("{owner_id}-{source_file}")),
                media_type: Some(document.media_type.clone()),
                owner_id: Some(owner_id.to_string()),
                heading: None,
            },
            separators: None,
        };
        let chunks = split_text(&document.text, &options)?;
        if chunks.is_empty() {
            return Err(IngestError::NoChunks);
        }
        tracing::info!(
            owner_id,
            source_file,
            chunks = chunks.len(),
            chunk_size = self.budget.chunk_size,
            chunk_overlap = self.budget.chunk_overlap,
            "Processing document"
        );

        let mut structure = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self.embedder.embed(&chunk.content).await?;
            if vector.is_empty() {
                tracing::warn!(source_file, position = chunk.position, "Embedding came back empty");
                return Err(EmbeddingClientError::EmptyResponse.into());
            }
            self.store
                .insert(ChunkInsert {
                    owner_id: owner_id.to_string(),
                    heading: chunk.heading.clone(),
                    content: chunk.content,
                    vector,
                    source_file: source_file.to_string(),
                    chunk_index: chunk.position,
                    total_chunks: chunk.total_chunks,
                })
                .await?;
            structure.push(StructureEntry {
                heading: chunk.heading,
                chunk_index: chunk.position,
            });
        }

        let chunks_count = structure.len();
        self.metrics
            .record_document(chunks_count as u64, self.budget.chunk_size as u64);
        tracing::info!(owner_id, source_file, chunks = chunks_count, "Document indexed");

        Ok(IngestOutcome {
            source_file: source_file.to_string(),
            chunks_count,
            structure,
        })
    }

    /// List the owner's documents, newest first.
    pub async fn list_documents(&self, owner_id: &str) -> Result<Vec<DocumentSummary>, IngestError> {
        let owner_id = require_owner(owner_id)?;
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    /// Delete every chunk of one of the owner's documents.
    pub async fn delete_document(
        &self,
        owner_id: &str,
        source_file: &str,
    ) -> Result<DeleteOutcome, IngestError> {
        let owner_id = require_owner(owner_id)?;
        let source_file = source_file.trim();
        if source_file.is_empty() {
            return Err(IngestError::MissingFilename);
        }

        let deleted_chunks = self.store.delete_by_source_file(owner_id, source_file).await?;
        if deleted_chunks == 0 {
            return Err(IngestError::NotFound(source_file.to_string()));
        }
        self.metrics.record_deletion(deleted_chunks as u64);
        tracing::info!(owner_id, source_file, deleted_chunks, "Document deleted");
        Ok(DeleteOutcome {
            source_file: source_file.to_string(),
            deleted_chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingClient;
    use crate::store::InMemoryStore;

    fn service() -> (DocumentService, Arc<InMemoryStore>, Arc<PipelineMetrics>) {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let service = DocumentService::new(
            Arc::new(HashEmbeddingClient::new(16)),
            store.clone(),
            ChunkBudget {
                chunk_size: 200,
                chunk_overlap: 30,
            },
            metrics.clone(),
        );
        (service, store, metrics)
    }

    fn document(text: &str) -> RawDocument {
        RawDocument {
            owner_id: "owner".into(),
            filename: "notes.md".into(),
            text: text.into(),
            media_type: "text/markdown".into(),
        }
    }

    #[tokio::test]
    async fn ingest_stores_every_chunk_in_order() {
        let (service, store, metrics) = service();
        let text = format!("# Notes\n{}", "A sentence about planning. ".repeat(30));

        let outcome = service.ingest(document(&text)).await.expect("ingest");

        assert!(outcome.chunks_count > 1);
        assert_eq!(store.len().await, outcome.chunks_count);
        for (index, entry) in outcome.structure.iter().enumerate() {
            assert_eq!(entry.chunk_index, index);
        }
        assert_eq!(outcome.structure[0].heading.as_deref(), Some("Notes"));
        assert_eq!(metrics.snapshot().chunks_indexed, outcome.chunks_count as u64);
    }

    #[tokio::test]
    async fn invalid_uploads_are_rejected() {
        let (service, store, _) = service();

        let mut blank_owner = document("text");
        blank_owner.owner_id = " ".into();
        assert!(matches!(service.ingest(blank_owner).await, Err(IngestError::MissingOwner)));

        let mut image = document("text");
        image.media_type = "image/png".into();
        assert!(matches!(
            service.ingest(image).await,
            Err(IngestError::UnsupportedMediaType(_))
        ));

        assert!(matches!(
            service.ingest(document(" \n ")).await,
            Err(IngestError::EmptyDocument)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_returns_count_or_not_found() {
        let (service, _, metrics) = service();
        let outcome = service
            .ingest(document(&"Plain words repeated. ".repeat(40)))
            .await
            .expect("ingest");

        let deleted = service.delete_document("owner", "notes.md").await.expect("delete");
        assert_eq!(deleted.deleted_chunks, outcome.chunks_count);
        assert_eq!(metrics.snapshot().documents_deleted, 1);

        assert!(matches!(
            service.delete_document("owner", "notes.md").await,
            Err(IngestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_is_owner_scoped() {
        let (service, _, _) = service();
        service.ingest(document("# Title\nBody text.")).await.expect("ingest");

        let mine = service.list_documents("owner").await.expect("list");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "notes.md › Title");
        assert!(service.list_documents("other").await.expect("list").is_empty());
    }
}
