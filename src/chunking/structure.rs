//! Section-aware pre-splitting for documents that carry structural markers.

use regex::Regex;
use std::sync::LazyLock;

use super::recursive::{RecursiveSplitter, TextPiece};
use super::types::ChunkingError;

/// Separators used to cut a structured document into section blocks, coarsest first.
pub const MARKDOWN_SEPARATORS: &[&str] = &[
    "\n# ",
    "\n## ",
    "\n### ",
    "\n#### ",
    "\n##### ",
    "\n###### ",
    "```\n\n",
    "\n\n***\n\n",
    "\n\n---\n\n",
    "\n\n___\n\n",
    "\n\n",
    "\n",
    " ",
    "",
];

/// Upper bound on the size of a section block, in characters.
pub const MAX_BLOCK_SIZE: usize = 2000;
/// Upper bound on the overlap between section blocks, in characters.
pub const MAX_BLOCK_OVERLAP: usize = 200;

static MARKDOWN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+\S").expect("valid markdown marker regex"));
static NUMBERED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d+[.)]|[A-Z][.)])[ \t]+\S").expect("valid numbered marker regex")
});

/// Whether the document has markdown or numbered headings anywhere in it.
pub fn has_structural_markers(text: &str) -> bool {
    MARKDOWN_MARKER.is_match(text) || NUMBERED_MARKER.is_match(text)
}

/// Block size and overlap used for section splitting, derived from the chunk budget.
pub fn block_budget(chunk_size: usize, chunk_overlap: usize) -> (usize, usize) {
    (
        chunk_size.saturating_mul(2).min(MAX_BLOCK_SIZE),
        chunk_overlap.min(MAX_BLOCK_OVERLAP),
    )
}

/// Partition `text` into blocks.
///
/// Structured documents are cut along section boundaries into blocks of up to twice the chunk
/// size; anything else comes back as one block spanning the whole text.
pub fn split_into_blocks(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<TextPiece<'_>>, ChunkingError> {
    if !has_structural_markers(text) {
        return Ok(whole_text_block(text));
    }

    let (block_size, block_overlap) = block_budget(chunk_size, chunk_overlap);
    let splitter = RecursiveSplitter::new(
        block_size,
        block_overlap,
        MARKDOWN_SEPARATORS.iter().map(|sep| sep.to_string()).collect(),
    )?;
    let blocks = splitter.split(text);
    tracing::debug!(
        blocks = blocks.len(),
        block_size,
        block_overlap,
        "Split structured document into section blocks"
    );
    Ok(blocks)
}

fn whole_text_block(text: &str) -> Vec<TextPiece<'_>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let offset = text.len() - text.trim_start().len();
    vec![TextPiece {
        offset,
        text: trimmed,
    }]
}
