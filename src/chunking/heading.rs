//! Heading heuristics.
//!
//! A line is a heading candidate when it looks like one of:
//!
//! - a markdown heading (`## Results`);
//! - a numbered or lettered heading (`3. Methods`, `B) Scope`);
//! - a bullet (`- Deadlines`);
//! - a short all-caps line (`GENERAL CONDITIONS`).
//!
//! Each rule is a standalone regex so it can be exercised on its own. The [`HeadingIndex`] maps
//! line numbers of a document to normalized heading text and answers "nearest heading at or
//! before line N" lookups for the chunk assembler.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Lines longer than this are never treated as headings.
pub const MAX_HEADING_LINE_CHARS: usize = 160;

/// Longest first line accepted as a fallback heading when no heading-like line exists.
pub const MAX_FALLBACK_HEADING_CHARS: usize = 90;

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+\S").expect("valid markdown heading regex"));
static NUMBERED_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+[.)]|[A-Z][.)])\s+\S").expect("valid numbered heading regex")
});
static BULLET_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•]\s+\S").expect("valid bullet heading regex"));
static UPPERCASE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[A-ZÁÉÍÓÚÜÑ0-9][A-ZÁÉÍÓÚÜÑ0-9\s,:;()'"-]{3,}$"#)
        .expect("valid uppercase heading regex")
});

static MARKDOWN_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s*").expect("valid markdown prefix regex"));
static NUMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").expect("valid number prefix regex"));
static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•]\s*").expect("valid bullet prefix regex"));

/// Whether the trimmed line is a markdown heading (`#` to `######` followed by text).
pub fn is_markdown_heading(line: &str) -> bool {
    MARKDOWN_HEADING.is_match(line.trim())
}

/// Whether the trimmed line starts with `12.`, `12)`, `A.` or `A)` followed by text.
pub fn is_numbered_heading(line: &str) -> bool {
    NUMBERED_HEADING.is_match(line.trim())
}

fn is_bullet_heading(line: &str) -> bool {
    BULLET_HEADING.is_match(line)
}

fn is_uppercase_heading(line: &str) -> bool {
    UPPERCASE_HEADING.is_match(line)
}

/// Decide whether a single line looks like a section heading.
pub fn is_heading_candidate(line: &str) -> bool {
    if line.chars().count() > MAX_HEADING_LINE_CHARS {
        return false;
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    is_markdown_heading(trimmed)
        || is_numbered_heading(trimmed)
        || is_bullet_heading(trimmed)
        || is_uppercase_heading(trimmed)
}

/// Strip heading markers (`#`, numbering, bullets) and surrounding whitespace.
///
/// Returns `None` when nothing but markers remain.
pub fn normalize_heading(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let without_hashes = MARKDOWN_PREFIX.replace(trimmed, "");
    let without_number = NUMBER_PREFIX.replace(&without_hashes, "");
    let without_bullet = BULLET_PREFIX.replace(&without_number, "");
    let normalized = without_bullet.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

/// Classify a line and return its normalized heading text when it is a candidate.
pub fn detect_heading(line: &str) -> Option<String> {
    if is_heading_candidate(line) {
        normalize_heading(line)
    } else {
        None
    }
}

/// Guess a heading from a chunk's own content.
///
/// Walks the non-empty lines in order; the first heading-like line wins, otherwise the first
/// line short enough to serve as a title.
pub fn infer_heading_from_content(content: &str) -> Option<String> {
    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if is_heading_candidate(line) {
            return normalize_heading(line);
        }
        if line.chars().count() <= MAX_FALLBACK_HEADING_CHARS {
            return Some(line.to_string());
        }
    }
    None
}

/// Line-indexed map of every heading found in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingIndex {
    entries: BTreeMap<usize, String>,
}

impl HeadingIndex {
    /// Scan every line of `text` (split on `\n`) and record the headings.
    pub fn build(text: &str) -> Self {
        let entries = text
            .split('\n')
            .enumerate()
            .filter_map(|(line, content)| detect_heading(content).map(|heading| (line, heading)))
            .collect();
        Self { entries }
    }

    /// Heading on `line` or on the closest line above it.
    pub fn nearest_at_or_before(&self, line: usize) -> Option<&str> {
        self.entries
            .range(..=line)
            .next_back()
            .map(|(_, heading)| heading.as_str())
    }

    /// Heading recorded for exactly `line`.
    pub fn get(&self, line: usize) -> Option<&str> {
        self.entries.get(&line).map(String::as_str)
    }

    /// Number of headings found.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no headings were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
