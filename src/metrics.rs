use crate::retrieval::QueryKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and answering activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_indexed: AtomicU64,
    chunks_indexed: AtomicU64,
    documents_deleted: AtomicU64,
    chunks_deleted: AtomicU64,
    questions_answered: AtomicU64,
    summaries_produced: AtomicU64,
    last_chunk_size: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document, its chunk count and the chunk size used.
    pub fn record_document(&self, chunk_count: u64, chunk_size: u64) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
        self.last_chunk_size.store(chunk_size, Ordering::Relaxed);
    }

    /// Record a deleted document and how many chunks went with it.
    pub fn record_deletion(&self, chunk_count: u64) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
        self.chunks_deleted.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record an answered chat message.
    pub fn record_answer(&self, kind: QueryKind) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        if kind == QueryKind::Summarization {
            self.summaries_produced.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_chunk_size = self.last_chunk_size.load(Ordering::Relaxed);
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            chunks_deleted: self.chunks_deleted.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            summaries_produced: self.summaries_produced.load(Ordering::Relaxed),
            last_chunk_size: (last_chunk_size > 0).then_some(last_chunk_size),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents indexed since startup.
    pub documents_indexed: u64,
    /// Total chunk count produced across all indexed documents.
    pub chunks_indexed: u64,
    /// Number of documents deleted since startup.
    pub documents_deleted: u64,
    /// Total chunks removed by deletions.
    pub chunks_deleted: u64,
    /// Number of chat messages answered.
    pub questions_answered: u64,
    /// Number of answers produced through map-reduce summarization.
    pub summaries_produced: u64,
    /// Chunk size used by the most recent ingestion, if any.
    pub last_chunk_size: Option<u64>,
}
