//! Core data types and error definitions for the chunking pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default chunk size, in characters, used when callers do not override it.
pub const DEFAULT_CHUNK_SIZE: usize = 1200;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// The configured chunk size cannot hold any text.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// The overlap would swallow the entire chunk budget.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Source information propagated onto every chunk produced from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Original file name of the upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Stable identifier used as the chunk id prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Media type reported by the upload layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Owner that the document belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Heading explicitly attached by the caller; wins over every inferred heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

impl SourceMetadata {
    /// Prefix used for chunk identifiers (`source_id`, then `source`, then `chunk`).
    pub fn id_prefix(&self) -> &str {
        self.source_id
            .as_deref()
            .or(self.source.as_deref())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("chunk")
    }
}

/// Caller-tunable knobs for [`split_text`](super::split_text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap shared by adjacent chunks; defaults to 15% of `chunk_size`.
    pub chunk_overlap: Option<usize>,
    /// Metadata copied onto every chunk.
    pub metadata: SourceMetadata,
    /// Separator preference list; defaults to [`DEFAULT_SEPARATORS`](super::recursive::DEFAULT_SEPARATORS).
    pub separators: Option<Vec<String>>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: None,
            metadata: SourceMetadata::default(),
            separators: None,
        }
    }
}

impl SplitOptions {
    /// Options with the given chunk size and the default overlap.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Overlap actually applied: the explicit value or 15% of the chunk size.
    pub fn effective_overlap(&self) -> usize {
        self.chunk_overlap
            .unwrap_or_else(|| default_overlap(self.chunk_size))
    }
}

/// Default overlap for a chunk size: 15%, rounded half up.
pub fn default_overlap(chunk_size: usize) -> usize {
    chunk_size.saturating_mul(15).saturating_add(50) / 100
}

/// A positioned, heading-annotated fragment of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Stable identifier, `"{source_id}-{position + 1}"`.
    pub id: String,
    /// Trimmed, non-empty chunk text.
    pub content: String,
    /// Nearest enclosing section title, when one could be inferred.
    pub heading: Option<String>,
    /// Zero-based position within the document.
    pub position: usize,
    /// Number of chunks produced for the document.
    pub total_chunks: usize,
    /// Content length in characters.
    pub length: usize,
    /// Zero-based line in the normalized document where the chunk starts.
    pub start_line: usize,
    /// Length in characters of the normalized document.
    pub original_length: usize,
    /// Source information shared by all chunks of the document.
    pub metadata: SourceMetadata,
}
