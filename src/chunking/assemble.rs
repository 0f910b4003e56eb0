//! Final pass that turns located pieces into numbered, heading-annotated chunks.

use super::heading::{HeadingIndex, infer_heading_from_content};
use super::recursive::{TextPiece, char_len};
use super::types::{Chunk, SourceMetadata};

/// Maps byte offsets of a document to zero-based line numbers.
pub(crate) struct LineLocator {
    newlines: Vec<usize>,
}

impl LineLocator {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            newlines: text.match_indices('\n').map(|(offset, _)| offset).collect(),
        }
    }

    /// Line containing `offset`.
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|newline| *newline < offset)
    }
}

/// Resolve the heading for one piece.
///
/// Priority: heading attached through the source metadata, then the nearest indexed heading at
/// or above the start line, then whatever the content itself suggests.
pub(crate) fn resolve_heading(
    content: &str,
    start_line: usize,
    headings: &HeadingIndex,
    metadata: &SourceMetadata,
) -> Option<String> {
    metadata
        .heading
        .as_deref()
        .map(str::trim)
        .filter(|heading| !heading.is_empty())
        .map(str::to_string)
        .or_else(|| headings.nearest_at_or_before(start_line).map(str::to_string))
        .or_else(|| infer_heading_from_content(content))
}

/// Build the chunk records for a document.
///
/// `pieces` carry byte offsets into `document`. Positions and the total count are assigned
/// only after the whole list is known, so every chunk agrees on `total_chunks`.
pub(crate) fn assemble_chunks(
    document: &str,
    pieces: &[TextPiece<'_>],
    headings: &HeadingIndex,
    metadata: &SourceMetadata,
) -> Vec<Chunk> {
    let locator = LineLocator::new(document);
    let original_length = char_len(document);
    let survivors: Vec<&TextPiece<'_>> = pieces
        .iter()
        .filter(|piece| !piece.text.trim().is_empty())
        .collect();
    let total_chunks = survivors.len();
    let prefix = metadata.id_prefix();

    survivors
        .into_iter()
        .enumerate()
        .map(|(position, piece)| {
            let content = piece.text.trim().to_string();
            let start_line = locator.line_of(piece.offset);
            let heading = resolve_heading(&content, start_line, headings, metadata);
            Chunk {
                id: format!("{prefix}-{}", position + 1),
                length: char_len(&content),
                content,
                heading,
                position,
                total_chunks,
                start_line,
                original_length,
                metadata: metadata.clone(),
            }
        })
        .collect()
}
