//! Records and errors shared by the vector store backends.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned while interacting with a vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A stored row could not be decoded, or an insert was malformed.
    #[error("Invalid chunk payload: {0}")]
    InvalidPayload(String),
}

/// Chunk ready to be written, including its embedding.
#[derive(Debug, Clone)]
pub struct ChunkInsert {
    /// Owner scoping the row.
    pub owner_id: String,
    /// Heading inferred for the chunk.
    pub heading: Option<String>,
    /// Chunk text.
    pub content: String,
    /// Embedding of `content`.
    pub vector: Vec<f32>,
    /// File the chunk was cut from.
    pub source_file: String,
    /// Zero-based position within the document.
    pub chunk_index: usize,
    /// Number of chunks the document produced.
    pub total_chunks: usize,
}

/// Row returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// Store-assigned identifier.
    pub id: String,
    /// Owner of the row.
    pub owner_id: String,
    /// Heading stored with the chunk.
    pub heading: Option<String>,
    /// Chunk text.
    pub content: String,
    /// File the chunk was cut from.
    pub source_file: String,
    /// Zero-based position within the document.
    pub chunk_index: usize,
    /// Number of chunks the document produced.
    pub total_chunks: usize,
    /// Cosine distance to the query vector (`1 - similarity`).
    pub distance: f32,
}

/// Per-file listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    /// File name the chunks came from.
    pub source_file: String,
    /// `"{source_file} › {heading}"` of the first chunk, or the bare file name.
    pub title: String,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// Earliest creation timestamp (RFC3339).
    pub created_at: String,
}

/// Payload persisted next to every vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChunkPayload {
    pub(crate) owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) heading: Option<String>,
    pub(crate) content: String,
    pub(crate) source_file: String,
    pub(crate) chunk_index: usize,
    pub(crate) total_chunks: usize,
    pub(crate) chunk_hash: String,
    pub(crate) created_at: String,
}

impl ChunkPayload {
    pub(crate) fn into_scored(self, id: String, similarity: f32) -> ScoredChunk {
        ScoredChunk {
            id,
            owner_id: self.owner_id,
            heading: self.heading,
            content: self.content,
            source_file: self.source_file,
            chunk_index: self.chunk_index,
            total_chunks: self.total_chunks,
            distance: 1.0 - similarity,
        }
    }
}

/// Fields needed to build a document listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListingRow {
    pub(crate) source_file: String,
    #[serde(default)]
    pub(crate) heading: Option<String>,
    #[serde(default)]
    pub(crate) chunk_index: usize,
    #[serde(default)]
    pub(crate) created_at: String,
}

#[derive(Default)]
struct ListingEntry {
    first_index: Option<usize>,
    first_heading: Option<String>,
    chunk_count: usize,
    created_at: Option<String>,
}

/// Fold rows into one summary per source file, newest first.
pub(crate) fn summarize_documents<I>(rows: I) -> Vec<DocumentSummary>
where
    I: IntoIterator<Item = ListingRow>,
{
    let mut grouped: BTreeMap<String, ListingEntry> = BTreeMap::new();
    for row in rows {
        let entry = grouped.entry(row.source_file).or_default();
        entry.chunk_count += 1;
        if entry.first_index.is_none_or(|index| row.chunk_index < index) {
            entry.first_index = Some(row.chunk_index);
            entry.first_heading = row
                .heading
                .map(|heading| heading.trim().to_string())
                .filter(|heading| !heading.is_empty());
        }
        if entry
            .created_at
            .as_deref()
            .is_none_or(|earliest| row.created_at.as_str() < earliest)
        {
            entry.created_at = Some(row.created_at);
        }
    }

    let mut summaries: Vec<DocumentSummary> = grouped
        .into_iter()
        .map(|(source_file, entry)| DocumentSummary {
            title: match entry.first_heading {
                Some(heading) => format!("{source_file} › {heading}"),
                None => source_file.clone(),
            },
            source_file,
            chunk_count: entry.chunk_count,
            created_at: entry.created_at.unwrap_or_default(),
        })
        .collect();
    summaries.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source_file: &str, heading: Option<&str>, index: usize, created_at: &str) -> ListingRow {
        ListingRow {
            source_file: source_file.into(),
            heading: heading.map(str::to_string),
            chunk_index: index,
            created_at: created_at.into(),
        }
    }

    #[test]
    fn listing_groups_by_file_and_sorts_newest_first() {
        let summaries = summarize_documents(vec![
            row("old.txt", Some("Intro"), 1, "2025-01-01T00:00:05Z"),
            row("old.txt", Some("Preface"), 0, "2025-01-01T00:00:01Z"),
            row("new.txt", None, 0, "2025-02-01T00:00:00Z"),
        ]);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].source_file, "new.txt");
        assert_eq!(summaries[0].title, "new.txt");
        assert_eq!(summaries[1].title, "old.txt › Preface");
        assert_eq!(summaries[1].chunk_count, 2);
        assert_eq!(summaries[1].created_at, "2025-01-01T00:00:01Z");
    }

    #[test]
    fn distance_is_one_minus_similarity() {
        let payload = ChunkPayload {
            owner_id: "u1".into(),
            heading: None,
            content: "text".into(),
            source_file: "a.txt".into(),
            chunk_index: 0,
            total_chunks: 1,
            chunk_hash: "h".into(),
            created_at: "2025-01-01T00:00:00Z".into(),
        };
        let scored = payload.into_scored("id-1".into(), 0.75);
        assert!((scored.distance - 0.25).abs() < f32::EPSILON);
    }
}
