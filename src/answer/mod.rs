//! Answering chat messages: direct RAG for targeted questions, map-reduce for summaries.

pub mod direct;
pub mod map_reduce;

pub use direct::{AnswerError, DirectAnswerer};
pub use map_reduce::{
    ChunkSummary, Condensation, MapReduceSummarizer, SummaryError, SummaryOutcome, SummaryState,
};

use crate::embedding::EmbeddingClientError;
use crate::generation::GenerationClient;
use crate::metrics::PipelineMetrics;
use crate::retrieval::{QueryClassifier, QueryKind, RetrievalError, Retriever};
use crate::store::{ScoredChunk, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Answer returned when retrieval finds nothing for the owner.
pub const NOTHING_RELEVANT_MESSAGE: &str = "I did not find anything in your documents related to that question. \
     Could you rephrase it or ask about another topic covered by your files?";

/// One exchange of the conversation so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// What the user said.
    #[serde(default)]
    pub user: String,
    /// What the assistant replied, if anything.
    #[serde(default)]
    pub assistant: Option<String>,
}

/// Retrieved chunk cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    /// File the chunk came from.
    pub source_file: String,
    /// Heading of the chunk.
    pub heading: Option<String>,
    /// Position of the chunk within its file.
    pub chunk_index: usize,
    /// Distance to the query.
    pub distance: f32,
}

impl From<&ScoredChunk> for SourceRef {
    fn from(chunk: &ScoredChunk) -> Self {
        Self {
            source_file: chunk.source_file.clone(),
            heading: chunk.heading.clone(),
            chunk_index: chunk.chunk_index,
            distance: chunk.distance,
        }
    }
}

/// Reply to one chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    /// Answer text.
    pub answer: String,
    /// How the message was classified.
    pub kind: QueryKind,
    /// Map-phase results, present for summarization answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_summaries: Option<Vec<ChunkSummary>>,
    /// Retrieved chunks in rank order.
    pub sources: Vec<SourceRef>,
}

/// Errors raised while answering a chat message.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The message was blank.
    #[error("Message is required")]
    EmptyMessage,
    /// The query could not be embedded.
    #[error("Failed to embed the question: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Retrieval from the store failed.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
    /// Map-reduce summarization failed.
    #[error(transparent)]
    Summary(#[from] SummaryError),
    /// Direct answer generation failed.
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

impl From<RetrievalError> for ChatError {
    fn from(error: RetrievalError) -> Self {
        match error {
            RetrievalError::Embedding(error) => Self::Embedding(error),
            RetrievalError::Store(error) => Self::Store(error),
        }
    }
}

/// Routes chat messages to the right answering strategy.
pub struct ChatService {
    classifier: QueryClassifier,
    retriever: Retriever,
    direct: DirectAnswerer,
    summarizer: MapReduceSummarizer,
    metrics: Arc<PipelineMetrics>,
}

impl ChatService {
    /// Wire the chat pipeline over a shared generator.
    pub fn new(
        classifier: QueryClassifier,
        retriever: Retriever,
        generator: Arc<dyn GenerationClient>,
        history_window: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            classifier,
            retriever,
            direct: DirectAnswerer::new(generator.clone(), history_window),
            summarizer: MapReduceSummarizer::new(generator),
            metrics,
        }
    }

    /// Classify `message`, retrieve the owner's chunks and answer.
    pub async fn classify_and_answer(
        &self,
        message: &str,
        owner_id: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatResponse, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let kind = self.classifier.classify(Some(message));
        let chunks = self.retriever.retrieve(owner_id, message, kind).await?;
        let sources: Vec<SourceRef> = chunks.iter().map(SourceRef::from).collect();

        if chunks.is_empty() {
            tracing::info!(owner_id, ?kind, "No chunks retrieved; skipping generation");
            return Ok(ChatResponse {
                answer: NOTHING_RELEVANT_MESSAGE.to_string(),
                kind,
                chunk_summaries: None,
                sources,
            });
        }

        let response = match kind {
            QueryKind::Summarization => {
                let outcome = self.summarizer.summarize(message, &chunks).await?;
                tracing::info!(
                    owner_id,
                    state = ?outcome.state,
                    chunks = chunks.len(),
                    "Summarization answered"
                );
                ChatResponse {
                    answer: outcome.answer,
                    kind,
                    chunk_summaries: Some(outcome.chunk_summaries),
                    sources,
                }
            }
            QueryKind::Targeted => {
                let answer = self.direct.answer(message, &chunks, history).await?;
                tracing::info!(owner_id, chunks = chunks.len(), "Direct answer produced");
                ChatResponse {
                    answer,
                    kind,
                    chunk_summaries: None,
                    sources,
                }
            }
        };
        self.metrics.record_answer(kind);
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::generation::{GenerationClient, GenerationClientError, GenerationOptions};
    use crate::store::ScoredChunk;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type Responder = dyn Fn(&str) -> Result<String, GenerationClientError> + Send + Sync;

    /// Generator answering through a closure and recording every call.
    pub(crate) struct ScriptedGenerator {
        respond: Box<Responder>,
        calls: Mutex<Vec<(String, GenerationOptions)>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new<F>(respond: F) -> Arc<Self>
        where
            F: Fn(&str) -> Result<String, GenerationClientError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                respond: Box::new(respond),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            let calls = self.calls.lock().expect("calls lock");
            calls.iter().map(|(prompt, _)| prompt.clone()).collect()
        }

        pub(crate) fn options(&self) -> Vec<GenerationOptions> {
            let calls = self.calls.lock().expect("calls lock");
            calls.iter().map(|(_, options)| *options).collect()
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedGenerator {
        async fn generate(
            &self,
            prompt: &str,
            options: GenerationOptions,
        ) -> Result<String, GenerationClientError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((prompt.to_string(), options));
            (self.respond)(prompt)
        }
    }

    pub(crate) fn scored(index: usize, heading: Option<&str>, content: &str) -> ScoredChunk {
        ScoredChunk {
            id: format!("id-{index}"),
            owner_id: "owner".into(),
            heading: heading.map(str::to_string),
            content: content.into(),
            source_file: "doc.txt".into(),
            chunk_index: index,
            total_chunks: 10,
            distance: index as f32 * 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedGenerator;
    use super::*;
    use crate::embedding::{EmbeddingClient, HashEmbeddingClient};
    use crate::retrieval::RetrievalLimits;
    use crate::store::{ChunkInsert, InMemoryStore, VectorStore};

    async fn service_with(
        generator: Arc<ScriptedGenerator>,
        passages: &[&str],
    ) -> (ChatService, Arc<PipelineMetrics>) {
        let embedder = Arc::new(HashEmbeddingClient::new(32));
        let store = Arc::new(InMemoryStore::new());
        for (index, passage) in passages.iter().enumerate() {
            store
                .insert(ChunkInsert {
                    owner_id: "owner".into(),
                    heading: Some(format!("Part {index}")),
                    content: passage.to_string(),
                    vector: embedder.embed(passage).await.expect("embed"),
                    source_file: "doc.txt".into(),
                    chunk_index: index,
                    total_chunks: passages.len(),
                })
                .await
                .expect("insert");
        }
        let metrics = Arc::new(PipelineMetrics::new());
        let service = ChatService::new(
            QueryClassifier::with_defaults().expect("classifier"),
            Retriever::new(embedder, store, RetrievalLimits::default()),
            generator,
            5,
            metrics.clone(),
        );
        (service, metrics)
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let generator = ScriptedGenerator::new(|_| Ok("unused".into()));
        let (service, _) = service_with(generator, &[]).await;
        let error = service
            .classify_and_answer("  ", "owner", &[])
            .await
            .expect_err("blank");
        assert!(matches!(error, ChatError::EmptyMessage));
    }

    #[tokio::test]
    async fn empty_retrieval_skips_generation() {
        let generator = ScriptedGenerator::new(|_| Ok("unused".into()));
        let (service, metrics) = service_with(generator.clone(), &[]).await;

        let response = service
            .classify_and_answer("what is the deadline?", "owner", &[])
            .await
            .expect("response");

        assert_eq!(response.answer, NOTHING_RELEVANT_MESSAGE);
        assert!(response.sources.is_empty());
        assert!(generator.prompts().is_empty());
        assert_eq!(metrics.snapshot().questions_answered, 0);
    }

    #[tokio::test]
    async fn targeted_question_uses_direct_answer() {
        let generator = ScriptedGenerator::new(|_| Ok("Friday.".into()));
        let passages = ["deadline is friday", "budget is large", "team is small", "office"];
        let (service, metrics) = service_with(generator.clone(), &passages).await;

        let response = service
            .classify_and_answer("what is the deadline?", "owner", &[])
            .await
            .expect("response");

        assert_eq!(response.kind, QueryKind::Targeted);
        assert_eq!(response.answer, "Friday.");
        assert_eq!(response.sources.len(), 3);
        assert!(response.chunk_summaries.is_none());
        assert_eq!(generator.prompts().len(), 1);
        assert_eq!(metrics.snapshot().questions_answered, 1);
    }

    #[tokio::test]
    async fn summary_request_runs_map_reduce() {
        let generator = ScriptedGenerator::new(|prompt| {
            if prompt.starts_with("The user asks") {
                Ok("Overall summary.".into())
            } else {
                Ok("A relevant point.".into())
            }
        });
        let passages = ["one", "two", "three", "four"];
        let (service, metrics) = service_with(generator.clone(), &passages).await;

        let response = service
            .classify_and_answer("Give me a summary", "owner", &[])
            .await
            .expect("response");

        assert_eq!(response.kind, QueryKind::Summarization);
        assert_eq!(response.answer, "Overall summary.");
        assert_eq!(response.chunk_summaries.as_ref().map(Vec::len), Some(4));
        assert_eq!(generator.prompts().len(), 5);
        assert_eq!(metrics.snapshot().summaries_produced, 1);
    }
}
