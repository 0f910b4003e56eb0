//! Keyword classifier deciding whether a message asks for a broad summary.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use thiserror::Error;

/// Patterns that mark a message as a summarization request.
pub const DEFAULT_SUMMARY_PATTERNS: &[&str] = &[
    r"\bsummary\b",
    r"\bsummarise\b",
    r"\bsummarize\b",
    r"\bresumen\b",
    r"\bresumir\b",
    r"\bresumeme\b",
    r"\bresume\b",
    r"\boverview\b",
    r"\bchapter\s+\d+\b",
    r"\bcapítulo\s+\d+\b",
];

/// How a message should be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Broad request answered by map-reduce summarization.
    Summarization,
    /// Specific question answered from a handful of chunks.
    Targeted,
}

/// Raised when a configured pattern does not compile.
#[derive(Debug, Error)]
#[error("Invalid summary pattern `{pattern}`: {source}")]
pub struct ClassifierError {
    /// Offending pattern.
    pub pattern: String,
    /// Compilation failure.
    #[source]
    pub source: regex::Error,
}

/// Case-insensitive pattern matcher over user messages.
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    patterns: Vec<Regex>,
}

impl QueryClassifier {
    /// Compile a classifier from an explicit pattern list.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ClassifierError {
                        pattern: pattern.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Classifier using [`DEFAULT_SUMMARY_PATTERNS`].
    pub fn with_defaults() -> Result<Self, ClassifierError> {
        Self::from_patterns(DEFAULT_SUMMARY_PATTERNS)
    }

    /// Classify a message; absent or blank messages are targeted.
    pub fn classify(&self, message: Option<&str>) -> QueryKind {
        let Some(message) = message.map(str::trim).filter(|message| !message.is_empty()) else {
            return QueryKind::Targeted;
        };
        if self.patterns.iter().any(|pattern| pattern.is_match(message)) {
            QueryKind::Summarization
        } else {
            QueryKind::Targeted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> QueryClassifier {
        QueryClassifier::with_defaults().expect("default patterns compile")
    }

    #[test]
    fn summary_keywords_trigger_summarization() {
        let classifier = classifier();
        for message in [
            "Give me a summary",
            "please SUMMARIZE the report",
            "Hazme un resumen del documento",
            "What happens in chapter 3?",
            "Resumeme el capítulo 12",
            "An overview please",
        ] {
            assert_eq!(
                classifier.classify(Some(message)),
                QueryKind::Summarization,
                "{message}"
            );
        }
    }

    #[test]
    fn specific_questions_are_targeted() {
        let classifier = classifier();
        assert_eq!(classifier.classify(Some("what is the deadline?")), QueryKind::Targeted);
        assert_eq!(classifier.classify(Some("summaries of chapters")), QueryKind::Targeted);
        assert_eq!(classifier.classify(Some("chapter three")), QueryKind::Targeted);
    }

    #[test]
    fn missing_or_blank_message_is_targeted() {
        let classifier = classifier();
        assert_eq!(classifier.classify(None), QueryKind::Targeted);
        assert_eq!(classifier.classify(Some("   ")), QueryKind::Targeted);
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let classifier = QueryClassifier::from_patterns([r"\brecap\b"]).expect("compile");
        assert_eq!(classifier.classify(Some("Quick RECAP")), QueryKind::Summarization);
        assert_eq!(classifier.classify(Some("a summary")), QueryKind::Targeted);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let error = QueryClassifier::from_patterns(["(unclosed"]).expect_err("invalid");
        assert_eq!(error.pattern, "(unclosed");
    }
}
