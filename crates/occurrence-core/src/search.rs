//! Regex search over buffer text.
//!
//! Used by [`MemoryHost`](crate::MemoryHost) to implement [`Host::search`](crate::Host::search).
//! All inputs and outputs are **character offsets** into the whole buffer text (lines joined by
//! `'\n'`); byte offsets never leave this module.

use regex::{Regex, RegexBuilder};

use crate::error::{OccurrenceError, Result};

/// A match as a half-open character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Inclusive start character offset.
    pub start: usize,
    /// Exclusive end character offset.
    pub end: usize,
}

impl SearchMatch {
    /// Returns the length of the match in characters.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if the match is empty.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[derive(Debug)]
pub(crate) struct CharIndex {
    char_to_byte: Vec<usize>,
    text_len: usize,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self {
            char_to_byte,
            text_len: text.len(),
        }
    }

    pub(crate) fn char_count(&self) -> usize {
        self.char_to_byte.len().saturating_sub(1)
    }

    pub(crate) fn char_to_byte(&self, char_offset: usize) -> usize {
        let clamped = char_offset.min(self.char_count());
        self.char_to_byte
            .get(clamped)
            .cloned()
            .unwrap_or(self.text_len)
    }

    pub(crate) fn byte_to_char(&self, byte_offset: usize) -> usize {
        let clamped = byte_offset.min(self.text_len);
        match self.char_to_byte.binary_search(&clamped) {
            Ok(idx) => idx,
            Err(idx) => idx,
        }
    }
}

/// Compile a normalized pattern value.
pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .multi_line(true)
        .build()
        .map_err(|err| OccurrenceError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}

fn to_chars(index: &CharIndex, m: regex::Match<'_>) -> SearchMatch {
    SearchMatch {
        start: index.byte_to_char(m.start()),
        end: index.byte_to_char(m.end()),
    }
}

/// First non-empty match starting at or after `from_char` (strictly after unless `inclusive`).
pub(crate) fn find_next(
    text: &str,
    index: &CharIndex,
    re: &Regex,
    from_char: usize,
    inclusive: bool,
) -> Option<SearchMatch> {
    let mut start_char = if inclusive { from_char } else { from_char + 1 };
    loop {
        if start_char > index.char_count() {
            return None;
        }
        let m = re.find_at(text, index.char_to_byte(start_char))?;
        let candidate = to_chars(index, m);
        if !candidate.is_empty() {
            return Some(candidate);
        }
        start_char = candidate.start + 1;
    }
}

/// Last non-empty match starting before `from_char` (or at it when `inclusive`).
pub(crate) fn find_prev(
    text: &str,
    index: &CharIndex,
    re: &Regex,
    from_char: usize,
    inclusive: bool,
) -> Option<SearchMatch> {
    let limit = if inclusive {
        from_char
    } else {
        from_char.checked_sub(1)?
    };

    // Matches may overlap, so every start position is probed rather than `find_iter`.
    let mut last = None;
    let mut start_char = 0;
    while start_char <= limit.min(index.char_count()) {
        let Some(m) = re.find_at(text, index.char_to_byte(start_char)) else {
            break;
        };
        let candidate = to_chars(index, m);
        if candidate.start > limit {
            break;
        }
        if !candidate.is_empty() {
            last = Some(candidate);
        }
        start_char = candidate.start + 1;
    }
    last
}
