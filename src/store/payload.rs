//! Helpers for constructing and hashing stored chunk payloads.

use super::types::{ChunkInsert, ChunkPayload};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload stored alongside one chunk vector.
pub(crate) fn build_payload(insert: &ChunkInsert, created_at: &str) -> ChunkPayload {
    ChunkPayload {
        owner_id: insert.owner_id.clone(),
        heading: insert
            .heading
            .as_ref()
            .map(|heading| heading.trim().to_string())
            .filter(|heading| !heading.is_empty()),
        content: insert.content.clone(),
        source_file: insert.source_file.clone(),
        chunk_index: insert.chunk_index,
        total_chunks: insert.total_chunks,
        chunk_hash: compute_chunk_hash(&insert.content),
        created_at: created_at.to_string(),
    }
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}
