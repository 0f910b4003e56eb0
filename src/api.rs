//! HTTP surface for Rusty RAG.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /documents` – Split, embed and store an uploaded document's extracted text.
//! - `GET /documents` – List the caller's documents, newest first.
//! - `DELETE /documents/:source_file` – Remove every chunk of one document.
//! - `POST /chat` – Answer a question from the caller's documents (direct or map-reduce).
//! - `POST /split` – Preview the chunks a text would produce without storing anything.
//! - `GET /metrics` – Observe ingestion and answering counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Owner-scoped routes read the caller from the `x-owner-id` header, which the upstream
//! authentication layer is expected to set.

use crate::answer::{ChatError, ConversationTurn};
use crate::chunking::{ChunkingError, SourceMetadata, SplitOptions};
use crate::processing::{IngestError, RagApi, RawDocument};
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Header carrying the authenticated owner identifier.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Build the HTTP router exposing the pipeline.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route(
            "/documents",
            post(upload_document::<S>).get(list_documents::<S>),
        )
        .route("/documents/:source_file", delete(delete_document::<S>))
        .route("/chat", post(chat::<S>))
        .route("/split", post(split_preview::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Owner identifier taken from [`OWNER_HEADER`].
struct OwnerId(String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
            .ok_or(AppError::MissingOwner)
    }
}

/// Request body for `POST /documents`.
#[derive(Deserialize)]
struct UploadRequest {
    /// Original file name; chunks are stored and deleted under it.
    filename: String,
    /// Extracted plain text.
    text: String,
    /// Media type of the original upload.
    #[serde(default = "default_media_type")]
    media_type: String,
}

fn default_media_type() -> String {
    "text/plain".to_string()
}

/// Split, embed and store a document for the caller.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    OwnerId(owner_id): OwnerId,
    Json(request): Json<UploadRequest>,
) -> Result<Response, AppError>
where
    S: RagApi,
{
    let outcome = service
        .ingest(RawDocument {
            owner_id,
            filename: request.filename,
            text: request.text,
            media_type: request.media_type,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

/// List the caller's documents.
async fn list_documents<S>(
    State(service): State<Arc<S>>,
    OwnerId(owner_id): OwnerId,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: RagApi,
{
    let documents = service.list_documents(&owner_id).await?;
    Ok(Json(json!({ "documents": documents })))
}

/// Delete one of the caller's documents by file name.
async fn delete_document<S>(
    State(service): State<Arc<S>>,
    OwnerId(owner_id): OwnerId,
    Path(source_file): Path<String>,
) -> Result<Response, AppError>
where
    S: RagApi,
{
    let outcome = service.delete_document(&owner_id, &source_file).await?;
    Ok(Json(outcome).into_response())
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default, alias = "conversationHistory")]
    conversation_history: Vec<ConversationTurn>,
}

/// Answer a chat message.
async fn chat<S>(
    State(service): State<Arc<S>>,
    OwnerId(owner_id): OwnerId,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError>
where
    S: RagApi,
{
    let response = service
        .chat(&owner_id, &request.message, &request.conversation_history)
        .await?;
    Ok(Json(response).into_response())
}

/// Request body for `POST /split`.
#[derive(Deserialize)]
struct SplitRequest {
    text: String,
    #[serde(default)]
    chunk_size: Option<usize>,
    #[serde(default)]
    chunk_overlap: Option<usize>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    heading: Option<String>,
}

/// Preview chunking; the configured budget applies unless the request overrides it.
async fn split_preview<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SplitRequest>,
) -> Result<Response, AppError>
where
    S: RagApi,
{
    let budget = service.chunk_budget();
    let chunk_overlap = match request.chunk_size {
        Some(_) => request.chunk_overlap,
        None => request.chunk_overlap.or(Some(budget.chunk_overlap)),
    };
    let options = SplitOptions {
        chunk_size: request.chunk_size.unwrap_or(budget.chunk_size),
        chunk_overlap,
        metadata: SourceMetadata {
            source: request.source,
            heading: request.heading,
            ..SourceMetadata::default()
        },
        separators: None,
    };
    let chunks = service.split_preview(&request.text, &options)?;
    Ok(Json(json!({ "total": chunks.len(), "chunks": chunks })).into_response())
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: RagApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_document",
                method: "POST",
                path: "/documents",
                description: "Split a document into heading-annotated chunks, embed them, and store them for the caller. Responds 201 with { \"source_file\", \"chunks_count\", \"structure\" }.",
                request_example: Some(json!({
                    "filename": "report.md",
                    "text": "# Report\nBody text",
                    "media_type": "text/markdown"
                })),
            },
            CommandDescriptor {
                name: "list_documents",
                method: "GET",
                path: "/documents",
                description: "List the caller's documents with chunk counts, newest first.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_document",
                method: "DELETE",
                path: "/documents/:source_file",
                description: "Delete every chunk stored for one of the caller's files.",
                request_example: None,
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Answer a question from the caller's documents. Summary requests run a map-reduce over many chunks.",
                request_example: Some(json!({
                    "message": "Give me a summary of chapter 2",
                    "conversation_history": [
                        { "user": "Hi", "assistant": "Hello! How can I help?" }
                    ]
                })),
            },
            CommandDescriptor {
                name: "split",
                method: "POST",
                path: "/split",
                description: "Preview chunking for a text without storing anything.",
                request_example: Some(json!({
                    "text": "## Section\nBody",
                    "chunk_size": 800
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and answering counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Failures surfaced by the HTTP handlers.
enum AppError {
    MissingOwner,
    Ingest(IngestError),
    Chat(ChatError),
    Chunking(ChunkingError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingOwner | Self::Ingest(IngestError::MissingOwner) => StatusCode::UNAUTHORIZED,
            Self::Ingest(IngestError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Ingest(IngestError::Embedding(_)) => StatusCode::BAD_GATEWAY,
            Self::Ingest(IngestError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ingest(_) => StatusCode::BAD_REQUEST,
            Self::Chat(ChatError::EmptyMessage) => StatusCode::BAD_REQUEST,
            Self::Chat(ChatError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Chat(_) => StatusCode::BAD_GATEWAY,
            Self::Chunking(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::MissingOwner => format!("missing {OWNER_HEADER} header"),
            Self::Ingest(error) => error.to_string(),
            Self::Chat(error) => error.to_string(),
            Self::Chunking(error) => error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %message, "Request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self::Ingest(inner)
    }
}

impl From<ChatError> for AppError {
    fn from(inner: ChatError) -> Self {
        Self::Chat(inner)
    }
}

impl From<ChunkingError> for AppError {
    fn from(inner: ChunkingError) -> Self {
        Self::Chunking(inner)
    }
}
