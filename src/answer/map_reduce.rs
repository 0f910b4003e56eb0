//! Two-phase summarization over many retrieved chunks.
//!
//! The map phase condenses every chunk independently and concurrently; the reduce phase merges
//! the relevant condensations into one answer. A request moves through
//! `Idle → Mapping → Reducing → Done`, or stops in `NoRelevantContent` when every map reply is
//! the sentinel.

use crate::generation::{GenerationClient, GenerationClientError, GenerationOptions};
use crate::store::ScoredChunk;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Reply a map call returns for a chunk with nothing relevant.
pub const NO_RELEVANT_INFORMATION: &str = "NO RELEVANT INFORMATION";
/// Spanish form of the sentinel, accepted from models that answer in the user's language.
pub const SIN_INFORMACION_RELEVANTE: &str = "SIN INFORMACIÓN RELEVANTE";
/// Answer returned when every chunk was judged irrelevant.
pub const NO_RELEVANT_CONTENT_MESSAGE: &str =
    "I could not find information in your documents that answers this question.";

const MAP_TEMPERATURE: f32 = 0.4;
const REDUCE_TEMPERATURE: f32 = 0.3;

/// Progress of one summarization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryState {
    /// Nothing to do yet (or nothing was retrieved).
    Idle,
    /// Map calls are in flight.
    Mapping,
    /// The reduce call is in flight.
    Reducing,
    /// An answer was produced.
    Done,
    /// Every chunk was irrelevant; the fallback message is the answer.
    NoRelevantContent,
}

/// Result of condensing one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Condensation {
    /// A short summary focused on the question.
    Summary(String),
    /// The model replied with the sentinel.
    NotRelevant,
}

/// Per-chunk output of the map phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    /// Retrieval rank of the chunk.
    pub index: usize,
    /// Heading of the chunk, when known.
    pub heading: Option<String>,
    /// What the map call produced.
    pub condensation: Condensation,
    /// Length of the chunk content in characters.
    pub original_length: usize,
}

/// Terminal state, answer and per-chunk summaries of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryOutcome {
    /// State the request ended in.
    pub state: SummaryState,
    /// Final answer text.
    pub answer: String,
    /// Every map-phase result, in rank order.
    pub chunk_summaries: Vec<ChunkSummary>,
}

/// Provider failures, tagged with the phase they happened in.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// A map call failed; the whole request is abandoned.
    #[error("Map phase failed for fragment {index}: {source}")]
    MapPhase {
        /// Rank of the chunk whose call failed.
        index: usize,
        /// Provider error.
        #[source]
        source: GenerationClientError,
    },
    /// The reduce call failed.
    #[error("Reduce phase failed: {0}")]
    ReducePhase(#[source] GenerationClientError),
}

enum MapResult {
    Summary(String),
    Sentinel,
    Failure(GenerationClientError),
}

/// Whether a map reply is the "nothing relevant" sentinel.
///
/// Surrounding quotes and punctuation are ignored, as is case.
pub fn is_sentinel(reply: &str) -> bool {
    let cleaned = reply
        .trim()
        .trim_matches(|ch: char| ch.is_ascii_punctuation() || "“”‘’«»".contains(ch))
        .trim()
        .to_uppercase();
    cleaned == NO_RELEVANT_INFORMATION || cleaned == SIN_INFORMACION_RELEVANTE
}

/// Prompt asking for a question-focused condensation of one chunk.
pub fn map_prompt(question: &str, index: usize, total: usize, chunk: &ScoredChunk) -> String {
    let heading = chunk
        .heading
        .as_deref()
        .map(|heading| format!(" (Heading: \"{heading}\")"))
        .unwrap_or_default();
    format!(
        "You condense document fragments with respect to a question.\n\
         User question: \"{question}\"\n\
         Fragment {number} of {total}{heading}:\n\
         \"\"\"\n{content}\n\"\"\"\n\
         Summarize this fragment in 2-3 sentences, focusing on what matters for the question. \
         If it is not relevant, reply exactly \"{NO_RELEVANT_INFORMATION}\".",
        number = index + 1,
        content = chunk.content,
    )
}

/// Prompt merging the relevant condensations into one answer.
pub fn reduce_prompt(question: &str, summaries: &[(usize, Option<&str>, &str)]) -> String {
    let formatted = summaries
        .iter()
        .map(|(index, heading, text)| {
            let label = heading
                .map(|heading| format!(" ({heading})"))
                .unwrap_or_default();
            format!("Summary of fragment {}{label}:\n- {text}", index + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "The user asks: \"{question}\"\n\
         These relevant summaries were extracted from their documents:\n\
         \n\
         {formatted}\n\
         \n\
         Combine them into one coherent, complete answer that is easy to follow. \
         Answer in the same language as the user."
    )
}

fn transition(state: &mut SummaryState, next: SummaryState) {
    tracing::debug!(from = ?*state, to = ?next, "Summary state transition");
    *state = next;
}

/// Map-reduce summarizer over a shared generation client.
pub struct MapReduceSummarizer {
    generator: Arc<dyn GenerationClient>,
}

impl MapReduceSummarizer {
    /// Create a summarizer backed by `generator`.
    pub fn new(generator: Arc<dyn GenerationClient>) -> Self {
        Self { generator }
    }

    async fn condense(
        &self,
        question: &str,
        index: usize,
        total: usize,
        chunk: &ScoredChunk,
    ) -> MapResult {
        let prompt = map_prompt(question, index, total, chunk);
        match self
            .generator
            .generate(&prompt, GenerationOptions::with_temperature(MAP_TEMPERATURE))
            .await
        {
            Ok(reply) if is_sentinel(&reply) => MapResult::Sentinel,
            Ok(reply) => MapResult::Summary(reply.trim().to_string()),
            Err(error) => MapResult::Failure(error),
        }
    }

    /// Summarize `chunks` (rank order) with respect to `question`.
    pub async fn summarize(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
    ) -> Result<SummaryOutcome, SummaryError> {
        let mut state = SummaryState::Idle;
        if chunks.is_empty() {
            return Ok(SummaryOutcome {
                state,
                answer: String::new(),
                chunk_summaries: Vec::new(),
            });
        }

        transition(&mut state, SummaryState::Mapping);
        let total = chunks.len();
        let results = join_all(
            chunks
                .iter()
                .enumerate()
                .map(|(index, chunk)| self.condense(question, index, total, chunk)),
        )
        .await;

        let mut chunk_summaries = Vec::with_capacity(total);
        for (index, (chunk, result)) in chunks.iter().zip(results).enumerate() {
            let condensation = match result {
                MapResult::Summary(text) => Condensation::Summary(text),
                MapResult::Sentinel => Condensation::NotRelevant,
                MapResult::Failure(source) => {
                    tracing::error!(index, error = %source, "Map call failed");
                    return Err(SummaryError::MapPhase { index, source });
                }
            };
            chunk_summaries.push(ChunkSummary {
                index,
                heading: chunk.heading.clone(),
                condensation,
                original_length: chunk.content.chars().count(),
            });
        }

        let relevant: Vec<(usize, Option<&str>, &str)> = chunk_summaries
            .iter()
            .filter_map(|summary| match &summary.condensation {
                Condensation::Summary(text) => {
                    Some((summary.index, summary.heading.as_deref(), text.as_str()))
                }
                Condensation::NotRelevant => None,
            })
            .collect();
        tracing::debug!(total, relevant = relevant.len(), "Map phase complete");

        if relevant.is_empty() {
            transition(&mut state, SummaryState::NoRelevantContent);
            return Ok(SummaryOutcome {
                state,
                answer: NO_RELEVANT_CONTENT_MESSAGE.to_string(),
                chunk_summaries,
            });
        }

        transition(&mut state, SummaryState::Reducing);
        let prompt = reduce_prompt(question, &relevant);
        let answer = self
            .generator
            .generate(&prompt, GenerationOptions::with_temperature(REDUCE_TEMPERATURE))
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Reduce call failed");
                SummaryError::ReducePhase(error)
            })?;

        transition(&mut state, SummaryState::Done);
        Ok(SummaryOutcome {
            state,
            answer: answer.trim().to_string(),
            chunk_summaries,
        })
    }
}
