#![deny(missing_docs)]

//! Core library for Rusty RAG: structure-aware chunking, vector retrieval, and
//! map-reduce summarization over uploaded documents.

/// Chat answering: direct RAG and map-reduce summaries.
pub mod answer;
/// HTTP routing and REST handlers.
pub mod api;
/// Heading-aware document chunking.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text generation client abstraction and adapters.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and answering counters.
pub mod metrics;
/// Document pipeline and the service facade.
pub mod processing;
/// Query classification and nearest-chunk retrieval.
pub mod retrieval;
/// Vector store abstraction with Qdrant and in-memory backends.
pub mod store;
