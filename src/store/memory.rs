//! Process-local [`VectorStore`] for offline use and tests.
//!
//! Rows live in a `Vec` behind a `tokio::sync::RwLock`; similarity search is brute-force cosine
//! similarity over the owner's rows.

use super::VectorStore;
use super::payload::{build_payload, current_timestamp_rfc3339, generate_point_id};
use super::types::{
    ChunkInsert, ChunkPayload, DocumentSummary, ListingRow, ScoredChunk, StoreError,
    summarize_documents,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

struct StoredRow {
    id: String,
    payload: ChunkPayload,
    vector: Vec<f32>,
}

/// In-memory store; contents vanish with the process.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<StoredRow>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all owners.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert(&self, chunk: ChunkInsert) -> Result<String, StoreError> {
        if chunk.vector.is_empty() {
            return Err(StoreError::InvalidPayload(
                "cannot store a chunk without an embedding".into(),
            ));
        }
        let id = generate_point_id();
        let payload = build_payload(&chunk, &current_timestamp_rfc3339());
        self.rows.write().await.push(StoredRow {
            id: id.clone(),
            payload,
            vector: chunk.vector,
        });
        Ok(id)
    }

    async fn query_nearest(
        &self,
        owner_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let rows = self.rows.read().await;
        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter(|row| row.payload.owner_id == owner_id)
            .map(|row| {
                let similarity = cosine_sim(vector, &row.vector);
                row.payload.clone().into_scored(row.id.clone(), similarity)
            })
            .collect();
        scored.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let rows = self.rows.read().await;
        Ok(summarize_documents(
            rows.iter()
                .filter(|row| row.payload.owner_id == owner_id)
                .map(|row| ListingRow {
                    source_file: row.payload.source_file.clone(),
                    heading: row.payload.heading.clone(),
                    chunk_index: row.payload.chunk_index,
                    created_at: row.payload.created_at.clone(),
                }),
        ))
    }

    async fn delete_by_source_file(
        &self,
        owner_id: &str,
        source_file: &str,
    ) -> Result<usize, StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| {
            !(row.payload.owner_id == owner_id && row.payload.source_file == source_file)
        });
        Ok(before - rows.len())
    }
}
