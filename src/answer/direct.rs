//! Single-pass retrieval-augmented answers.

use super::ConversationTurn;
use crate::generation::{GenerationClient, GenerationClientError, GenerationOptions};
use crate::store::ScoredChunk;
use std::sync::Arc;
use thiserror::Error;

/// Separator placed between retrieved passages in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Errors raised while producing a direct answer.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// The generation provider failed.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationClientError),
}

/// Render the most recent `window` turns, skipping turns without a user utterance.
pub fn format_history(history: &[ConversationTurn], window: usize) -> Option<String> {
    let start = history.len().saturating_sub(window);
    let lines: Vec<String> = history[start..]
        .iter()
        .filter(|turn| !turn.user.trim().is_empty())
        .map(|turn| match turn.assistant.as_deref().map(str::trim) {
            Some(reply) if !reply.is_empty() => {
                format!("User: {}\nAssistant: {reply}", turn.user.trim())
            }
            _ => format!("User: {}", turn.user.trim()),
        })
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n\n"))
    }
}

/// Build the prompt for a grounded answer.
pub fn build_prompt(question: &str, context: &str, history: Option<&str>) -> String {
    format!(
        "You are an assistant that answers questions about the user's documents.\n\
         \n\
         Instructions:\n\
         1. Base your answer on the context below.\n\
         2. If the answer is not in the context, say so plainly before offering anything else.\n\
         3. Answer in the same language as the user.\n\
         \n\
         Context:\n{context}\n\
         \n\
         Conversation history:\n{history}\n\
         \n\
         User question:\n\"{question}\"\n\
         \n\
         Answer:",
        history = history.unwrap_or("None"),
    )
}

/// Answers targeted questions from a small set of retrieved chunks.
pub struct DirectAnswerer {
    generator: Arc<dyn GenerationClient>,
    history_window: usize,
}

impl DirectAnswerer {
    /// Create an answerer that folds at most `history_window` turns into the prompt.
    pub fn new(generator: Arc<dyn GenerationClient>, history_window: usize) -> Self {
        Self {
            generator,
            history_window,
        }
    }

    /// Produce one answer grounded in `chunks` (rank order).
    pub async fn answer(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
        history: &[ConversationTurn],
    ) -> Result<String, AnswerError> {
        let context = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        let history = format_history(history, self.history_window);
        let prompt = build_prompt(question, &context, history.as_deref());
        tracing::debug!(
            chunks = chunks.len(),
            context_chars = context.len(),
            "Generating direct answer"
        );

        let answer = self
            .generator
            .generate(&prompt, GenerationOptions::default())
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Direct answer generation failed");
                AnswerError::Generation(error)
            })?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::testing::{ScriptedGenerator, scored};

    fn turn(user: &str, assistant: Option<&str>) -> ConversationTurn {
        ConversationTurn {
            user: user.into(),
            assistant: assistant.map(str::to_string),
        }
    }

    #[test]
    fn history_keeps_only_recent_turns() {
        let history: Vec<ConversationTurn> = (0..7)
            .map(|index| turn(&format!("q{index}"), Some(&format!("a{index}"))))
            .collect();
        let rendered = format_history(&history, 5).expect("history");
        assert!(!rendered.contains("q1"));
        assert!(rendered.starts_with("User: q2\nAssistant: a2"));
        assert!(rendered.ends_with("User: q6\nAssistant: a6"));
    }

    #[test]
    fn history_skips_empty_users_and_handles_missing_replies() {
        let history = vec![turn("  ", Some("orphan")), turn("hello", None)];
        assert_eq!(format_history(&history, 5).as_deref(), Some("User: hello"));
        assert_eq!(format_history(&[], 5), None);
    }

    #[tokio::test]
    async fn prompt_joins_context_in_rank_order() {
        let generator = ScriptedGenerator::new(|_| Ok("  The deadline is Friday. ".into()));
        let answerer = DirectAnswerer::new(generator.clone(), 5);
        let chunks = vec![scored(0, Some("Plan"), "first passage"), scored(1, None, "second passage")];

        let answer = answerer
            .answer("What is the deadline?", &chunks, &[])
            .await
            .expect("answer");

        assert_eq!(answer, "The deadline is Friday.");
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("first passage\n\n---\n\nsecond passage"));
        assert!(prompts[0].contains("Conversation history:\nNone"));
        assert_eq!(generator.options()[0], GenerationOptions::default());
    }

    #[tokio::test]
    async fn provider_failure_is_an_answer_error() {
        let generator = ScriptedGenerator::new(|_| {
            Err(GenerationClientError::ProviderUnavailable("offline".into()))
        });
        let answerer = DirectAnswerer::new(generator, 5);
        let error = answerer
            .answer("question", &[scored(0, None, "text")], &[])
            .await
            .expect_err("failure");
        assert!(matches!(error, AnswerError::Generation(_)));
    }
}
