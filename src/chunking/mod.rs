//! Structure-aware chunking: heading inference, section blocks, and bounded pieces.
//!
//! [`split_text`] is the entry point used at ingestion time:
//!
//! 1. normalize line endings and trim;
//! 2. index every heading-like line ([`heading::HeadingIndex`]);
//! 3. cut structured documents into section blocks ([`structure::split_into_blocks`]);
//! 4. split each block into overlapping, size-bounded pieces ([`recursive::RecursiveSplitter`]);
//! 5. number the pieces and attach the nearest heading to each.

mod assemble;
pub mod heading;
pub mod recursive;
pub mod structure;
pub mod types;

pub use types::{Chunk, ChunkingError, DEFAULT_CHUNK_SIZE, SourceMetadata, SplitOptions};

use heading::HeadingIndex;
use recursive::{DEFAULT_SEPARATORS, RecursiveSplitter, TextPiece};

/// Normalize `\r\n` line endings and trim surrounding whitespace.
pub fn normalize_text(raw_text: &str) -> String {
    raw_text.replace("\r\n", "\n").trim().to_string()
}

/// Split a document into ordered, heading-annotated chunks.
///
/// Returns an empty vector when the text is blank. Invalid budgets (zero chunk size, or an
/// overlap at least as large as the chunk size) are rejected before any work happens.
pub fn split_text(raw_text: &str, options: &SplitOptions) -> Result<Vec<Chunk>, ChunkingError> {
    let chunk_size = options.chunk_size;
    let chunk_overlap = options.effective_overlap();
    let separators = options
        .separators
        .clone()
        .filter(|separators| !separators.is_empty())
        .unwrap_or_else(|| DEFAULT_SEPARATORS.iter().map(|sep| sep.to_string()).collect());
    let splitter = RecursiveSplitter::new(chunk_size, chunk_overlap, separators)?;

    let text = normalize_text(raw_text);
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let headings = HeadingIndex::build(&text);
    let blocks = structure::split_into_blocks(&text, chunk_size, chunk_overlap)?;

    let pieces: Vec<TextPiece<'_>> = blocks
        .iter()
        .flat_map(|block| {
            splitter
                .split(block.text)
                .into_iter()
                .map(move |piece| TextPiece {
                    offset: block.offset + piece.offset,
                    text: piece.text,
                })
        })
        .collect();

    let chunks = assemble::assemble_chunks(&text, &pieces, &headings, &options.metadata);
    tracing::debug!(
        source = options.metadata.source.as_deref().unwrap_or("<inline>"),
        chunk_size,
        chunk_overlap,
        blocks = blocks.len(),
        headings = headings.len(),
        chunks = chunks.len(),
        "Split document into chunks"
    );
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(seed: &str, sentences: usize) -> String {
        (0..sentences)
            .map(|index| format!("{seed} sentence number {index} carries some filler words"))
            .collect::<Vec<_>>()
            .join(". ")
    }

    #[test]
    fn blank_text_yields_no_chunks() {
        let chunks = split_text(" \r\n\t ", &SplitOptions::default()).expect("split");
        assert!(chunks.is_empty());
    }

    #[test]
    fn invalid_budget_is_rejected() {
        let options = SplitOptions {
            chunk_size: 100,
            chunk_overlap: Some(100),
            ..SplitOptions::default()
        };
        assert!(matches!(
            split_text("text", &options),
            Err(ChunkingError::InvalidOverlap { .. })
        ));
        assert_eq!(
            split_text("text", &SplitOptions::with_chunk_size(0)),
            Err(ChunkingError::InvalidChunkSize)
        );
    }

    #[test]
    fn positions_are_contiguous_and_totals_agree() {
        let text = paragraph("Plain", 80);
        let chunks = split_text(&text, &SplitOptions::with_chunk_size(300)).expect("split");
        assert!(chunks.len() > 3);
        let total = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, index);
            assert_eq!(chunk.total_chunks, total);
            assert!(!chunk.content.trim().is_empty());
            assert!(chunk.length <= 300);
        }
    }

    #[test]
    fn chunks_cover_every_word_of_the_source() {
        let text = paragraph("Coverage", 40);
        let chunks = split_text(&text, &SplitOptions::with_chunk_size(200)).expect("split");
        let combined: String = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for word in text.split_whitespace() {
            assert!(combined.contains(word), "missing {word}");
        }
    }

    #[test]
    fn crlf_is_normalized() {
        let chunks =
            split_text("line one\r\nline two", &SplitOptions::default()).expect("split");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "line one\nline two");
    }

    #[test]
    fn chunk_after_markdown_heading_inherits_it() {
        let text = format!(
            "# Report\n{}\n\n## Results\n{}",
            paragraph("Intro", 20),
            paragraph("Outcome", 20)
        );
        let chunks = split_text(&text, &SplitOptions::with_chunk_size(400)).expect("split");
        let results: Vec<&Chunk> = chunks
            .iter()
            .filter(|chunk| chunk.content.contains("Outcome sentence"))
            .collect();
        assert!(!results.is_empty());
        for chunk in results {
            assert_eq!(chunk.heading.as_deref(), Some("Results"));
        }
        assert_eq!(chunks[0].heading.as_deref(), Some("Report"));
    }

    #[test]
    fn metadata_travels_onto_every_chunk() {
        let options = SplitOptions {
            chunk_size: 120,
            metadata: SourceMetadata {
                source: Some("notes.txt".into()),
                source_id: Some("u1-notes.txt".into()),
                media_type: Some("text/plain".into()),
                owner_id: Some("u1".into()),
                heading: None,
            },
            ..SplitOptions::default()
        };
        let chunks = split_text(&paragraph("Meta", 10), &options).expect("split");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.metadata.source.as_deref(), Some("notes.txt"));
            assert!(chunk.id.starts_with("u1-notes.txt-"));
        }
        assert_eq!(chunks[0].id, "u1-notes.txt-1");
    }

    #[test]
    fn custom_separators_are_honoured() {
        let options = SplitOptions {
            chunk_size: 12,
            chunk_overlap: Some(0),
            separators: Some(vec!["|".into(), "".into()]),
            ..SplitOptions::default()
        };
        let chunks = split_text("alpha beta|gamma delta|epsilon", &options).expect("split");
        let contents: Vec<&str> = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha beta", "|gamma delta", "|epsilon"]);
    }
}
