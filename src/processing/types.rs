//! Data types and error definitions for document ingestion.

use crate::chunking::ChunkingError;
use crate::embedding::EmbeddingClientError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extracted document handed over by the upload layer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    /// Owner the document belongs to.
    pub owner_id: String,
    /// Original file name.
    pub filename: String,
    /// Extracted plain text.
    pub text: String,
    /// Media type of the original upload.
    pub media_type: String,
}

/// Heading and position of one produced chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureEntry {
    /// Heading inferred for the chunk.
    pub heading: Option<String>,
    /// Zero-based chunk position.
    pub chunk_index: usize,
}

/// Result of a completed ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// File the chunks were stored under.
    pub source_file: String,
    /// Number of chunks stored.
    pub chunks_count: usize,
    /// Per-chunk heading outline.
    pub structure: Vec<StructureEntry>,
}

/// Result of deleting a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// File whose chunks were removed.
    pub source_file: String,
    /// Number of chunks removed.
    pub deleted_chunks: usize,
}

/// Errors emitted by the document pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No owner identifier was supplied.
    #[error("Owner identifier is required")]
    MissingOwner,
    /// No file name was supplied.
    #[error("File name is required")]
    MissingFilename,
    /// The extracted text was blank.
    #[error("Could not extract text from the document")]
    EmptyDocument,
    /// The media type is not accepted.
    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),
    /// Splitting produced no chunks.
    #[error("No chunks could be produced from the document")]
    NoChunks,
    /// Nothing is stored under the requested file.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// Chunking step rejected its budget.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store request failed.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Whether the error stems from caller input rather than a backend.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFilename
                | Self::EmptyDocument
                | Self::UnsupportedMediaType(_)
                | Self::NoChunks
                | Self::Chunking(_)
        )
    }
}

/// Whether uploads of `media_type` are accepted (`text/*` or PDF with extracted text).
pub fn is_supported_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/") || essence == "application/pdf"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text_and_pdf_media_types() {
        assert!(is_supported_media_type("text/plain"));
        assert!(is_supported_media_type("text/markdown; charset=utf-8"));
        assert!(is_supported_media_type("Application/PDF"));
        assert!(!is_supported_media_type("image/png"));
        assert!(!is_supported_media_type(""));
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(IngestError::NoChunks.is_input_error());
        assert!(!IngestError::MissingOwner.is_input_error());
        assert!(!IngestError::NotFound("a".into()).is_input_error());
    }
}
