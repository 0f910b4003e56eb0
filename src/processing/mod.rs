//! Document pipeline and the facade shared by the HTTP surface and the CLI.

mod service;
pub mod types;

pub use service::{ChunkBudget, DocumentService};
pub use types::{
    DeleteOutcome, IngestError, IngestOutcome, RawDocument, StructureEntry,
    is_supported_media_type,
};

use crate::answer::{ChatError, ChatResponse, ChatService, ConversationTurn};
use crate::chunking::{Chunk, ChunkingError, SplitOptions, split_text};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::store::DocumentSummary;
use async_trait::async_trait;
use std::sync::Arc;

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Split, embed and store an uploaded document.
    async fn ingest(&self, document: RawDocument) -> Result<IngestOutcome, IngestError>;

    /// List the owner's documents, newest first.
    async fn list_documents(&self, owner_id: &str) -> Result<Vec<DocumentSummary>, IngestError>;

    /// Delete one of the owner's documents.
    async fn delete_document(
        &self,
        owner_id: &str,
        source_file: &str,
    ) -> Result<DeleteOutcome, IngestError>;

    /// Answer a chat message from the owner's documents.
    async fn chat(
        &self,
        owner_id: &str,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatResponse, ChatError>;

    /// Budget applied when splitting uploaded documents.
    fn chunk_budget(&self) -> ChunkBudget;

    /// Split text without storing anything.
    fn split_preview(
        &self,
        text: &str,
        options: &SplitOptions,
    ) -> Result<Vec<Chunk>, ChunkingError> {
        split_text(text, options)
    }

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Document and chat services bundled behind one handle.
pub struct RagService {
    documents: DocumentService,
    chat: ChatService,
    metrics: Arc<PipelineMetrics>,
}

impl RagService {
    /// Bundle the two services; `metrics` should be the registry both were built with.
    pub fn new(
        documents: DocumentService,
        chat: ChatService,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            documents,
            chat,
            metrics,
        }
    }

    /// Document half of the pipeline.
    pub fn documents(&self) -> &DocumentService {
        &self.documents
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest(&self, document: RawDocument) -> Result<IngestOutcome, IngestError> {
        self.documents.ingest(document).await
    }

    async fn list_documents(&self, owner_id: &str) -> Result<Vec<DocumentSummary>, IngestError> {
        self.documents.list_documents(owner_id).await
    }

    async fn delete_document(
        &self,
        owner_id: &str,
        source_file: &str,
    ) -> Result<DeleteOutcome, IngestError> {
        self.documents.delete_document(owner_id, source_file).await
    }

    async fn chat(
        &self,
        owner_id: &str,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatResponse, ChatError> {
        self.chat.classify_and_answer(message, owner_id, history).await
    }

    fn chunk_budget(&self) -> ChunkBudget {
        self.documents.budget()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
