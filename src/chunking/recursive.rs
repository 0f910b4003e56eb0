//! Recursive, separator-driven text splitter with character budgets and overlap.
//!
//! The splitter walks an ordered separator list. For a given span it uses the first separator
//! that occurs in the span, cuts *before* every occurrence (so the separator stays attached to
//! the following piece), and greedily merges the resulting splits back into windows that fit
//! the chunk size. Splits that are still oversized are split again with the remaining, finer
//! separators; once the list is exhausted the span is cut at raw character boundaries.
//!
//! When a window is emitted, splits are dropped from its front until at most `chunk_overlap`
//! characters remain; those trailing splits open the next window, which is how adjacent
//! pieces share context across a cut.
//!
//! Every emitted piece is a trimmed, contiguous slice of the input and remembers its byte
//! offset, which the assembler turns into line numbers for heading lookup.

use std::collections::VecDeque;
use std::ops::Range;

use super::types::ChunkingError;

/// Separator preference used for chunking when the caller does not supply one.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n### ", "\n## ", "\n# ", "\n\n", ". ", " ", ""];

/// A trimmed slice of the input along with its byte offset in that input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPiece<'a> {
    /// Byte offset of `text` inside the string that was split.
    pub offset: usize,
    /// Trimmed, non-empty piece text.
    pub text: &'a str,
}

/// Character-budgeted recursive splitter.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Build a splitter, rejecting impossible budgets.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::InvalidOverlap {
                overlap: chunk_overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    /// Build a splitter using [`DEFAULT_SEPARATORS`].
    pub fn with_default_separators(
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, ChunkingError> {
        Self::new(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|sep| sep.to_string()).collect(),
        )
    }

    /// Configured chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured overlap in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into ordered, trimmed, non-empty pieces.
    pub fn split<'a>(&self, text: &'a str) -> Vec<TextPiece<'a>> {
        let mut pieces = Vec::new();
        if !text.trim().is_empty() {
            self.split_span(text, 0..text.len(), &self.separators, &mut pieces);
        }
        pieces
    }

    fn split_span<'a>(
        &self,
        text: &'a str,
        span: Range<usize>,
        separators: &[String],
        out: &mut Vec<TextPiece<'a>>,
    ) {
        let (separator, finer) = pick_separator(&text[span.clone()], separators);
        let splits = split_before_separator(text, span, separator);

        let mut pending: Vec<Range<usize>> = Vec::new();
        for split in splits {
            if char_len(&text[split.clone()]) < self.chunk_size {
                pending.push(split);
                continue;
            }

            if !pending.is_empty() {
                self.merge_splits(text, &pending, out);
                pending.clear();
            }

            match finer {
                Some(rest) => self.split_span(text, split, rest, out),
                None => push_trimmed(text, split, out),
            }
        }

        if !pending.is_empty() {
            self.merge_splits(text, &pending, out);
        }
    }

    fn merge_splits<'a>(&self, text: &'a str, splits: &[Range<usize>], out: &mut Vec<TextPiece<'a>>) {
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(&text[split.clone()]);
            if total + len > self.chunk_size && !window.is_empty() {
                if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
                    push_trimmed(text, first.start..last.end, out);
                }
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((split.clone(), len));
            total += len;
        }

        if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
            push_trimmed(text, first.start..last.end, out);
        }
    }
}

/// First separator present in `segment`, plus the finer separators left for recursion.
///
/// The empty separator always applies and leaves nothing finer; when no listed separator
/// occurs the span falls back to character cuts.
fn pick_separator<'s>(segment: &str, separators: &'s [String]) -> (&'s str, Option<&'s [String]>) {
    for (index, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", None);
        }
        if segment.contains(separator.as_str()) {
            return (separator.as_str(), Some(&separators[index + 1..]));
        }
    }
    ("", None)
}

/// Cut `span` before every occurrence of `separator`; the empty separator cuts per character.
fn split_before_separator(text: &str, span: Range<usize>, separator: &str) -> Vec<Range<usize>> {
    let base = span.start;
    let segment = &text[span];

    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(offset, ch)| base + offset..base + offset + ch.len_utf8())
            .collect();
    }

    let mut cuts: Vec<usize> = segment
        .match_indices(separator)
        .map(|(offset, _)| offset)
        .filter(|offset| *offset > 0)
        .collect();
    cuts.push(segment.len());

    let mut splits = Vec::with_capacity(cuts.len());
    let mut start = 0;
    for cut in cuts {
        if cut > start {
            splits.push(base + start..base + cut);
        }
        start = cut;
    }
    splits
}

fn push_trimmed<'a>(text: &'a str, span: Range<usize>, out: &mut Vec<TextPiece<'a>>) {
    let raw = &text[span.clone()];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let leading = raw.len() - raw.trim_start().len();
    out.push(TextPiece {
        offset: span.start + leading,
        text: trimmed,
    });
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, overlap: usize, separators: &[&str]) -> RecursiveSplitter {
        RecursiveSplitter::new(
            chunk_size,
            overlap,
            separators.iter().map(|sep| sep.to_string()).collect(),
        )
        .expect("valid splitter")
    }

    fn texts<'a>(pieces: &[TextPiece<'a>]) -> Vec<&'a str> {
        pieces.iter().map(|piece| piece.text).collect()
    }

    fn numbered_words(count: usize) -> String {
        (1..=count)
            .map(|index| format!("w{index:04}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let error = RecursiveSplitter::with_default_separators(0, 0).unwrap_err();
        assert_eq!(error, ChunkingError::InvalidChunkSize);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let error = RecursiveSplitter::with_default_separators(10, 10).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidOverlap { .. }));
    }

    #[test]
    fn short_text_is_a_single_piece() {
        let pieces = splitter(100, 10, DEFAULT_SEPARATORS).split("  hello world  ");
        assert_eq!(texts(&pieces), vec!["hello world"]);
        assert_eq!(pieces[0].offset, 2);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(splitter(10, 2, DEFAULT_SEPARATORS).split(" \n\n \t").is_empty());
    }

    #[test]
    fn prefers_paragraph_breaks_over_sentences() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let pieces = splitter(30, 0, DEFAULT_SEPARATORS).split(text);
        assert_eq!(
            texts(&pieces),
            vec!["First paragraph here.", "Second paragraph here."]
        );
    }

    #[test]
    fn keeps_separator_at_start_of_following_piece() {
        let text = "intro text\n## Results\nresult body";
        let pieces = splitter(20, 0, DEFAULT_SEPARATORS).split(text);
        assert_eq!(pieces[0].text, "intro text");
        assert!(pieces[1].text.starts_with("## Results"));
    }

    #[test]
    fn respects_character_budget() {
        let text = numbered_words(200);
        let pieces = splitter(60, 12, DEFAULT_SEPARATORS).split(&text);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(char_len(piece.text) <= 60, "piece too long: {}", piece.text);
        }
    }

    #[test]
    fn adjacent_pieces_share_bounded_overlap() {
        let text = numbered_words(60);
        let pieces = splitter(60, 18, DEFAULT_SEPARATORS).split(&text);
        assert!(pieces.len() > 2);
        for pair in pieces.windows(2) {
            let previous_words: Vec<&str> = pair[0].text.split(' ').collect();
            let next_words: Vec<&str> = pair[1].text.split(' ').collect();
            let shared = previous_words
                .iter()
                .rev()
                .take_while(|word| next_words.contains(word))
                .count();
            assert!(shared > 0, "no overlap between {:?}", pair);
            let overlap_text = previous_words[previous_words.len() - shared..].join(" ");
            assert!(pair[1].text.starts_with(&overlap_text));
            assert!(char_len(&overlap_text) <= 18);
        }
    }

    #[test]
    fn no_overlap_when_disabled() {
        let text = numbered_words(30);
        let pieces = splitter(30, 0, DEFAULT_SEPARATORS).split(&text);
        let rebuilt = texts(&pieces).join(" ");
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn falls_back_to_character_cuts() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let pieces = splitter(10, 0, DEFAULT_SEPARATORS).split(text);
        assert_eq!(texts(&pieces), vec!["abcdefghij", "klmnopqrst", "uvwxyz"]);
    }

    #[test]
    fn character_cuts_respect_utf8_boundaries() {
        let text = "ñandú".repeat(6);
        let pieces = splitter(7, 0, &[""]).split(&text);
        for piece in &pieces {
            assert!(char_len(piece.text) <= 7);
        }
        assert_eq!(texts(&pieces).concat(), text);
    }

    #[test]
    fn offsets_point_back_into_the_input() {
        let text = "Alpha beta gamma.\n\nDelta epsilon zeta.\n\nEta theta iota.";
        let pieces = splitter(25, 0, DEFAULT_SEPARATORS).split(text);
        for piece in &pieces {
            assert_eq!(&text[piece.offset..piece.offset + piece.text.len()], piece.text);
        }
    }

    #[test]
    fn exhausted_separators_fall_back_to_character_cuts() {
        let text = "aaaaaaaaaaaaaaa bbb";
        let pieces = splitter(5, 0, &[" "]).split(text);
        assert_eq!(texts(&pieces), vec!["aaaaa", "aaaaa", "aaaaa", "bbb"]);
    }
}
