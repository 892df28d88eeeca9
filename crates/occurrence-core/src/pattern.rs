//! Search patterns.
//!
//! A [`Pattern`] is an opaque, normalized search key handed to the host's search primitive. The
//! normalized value uses `regex` syntax. Equality (and therefore de-duplication inside an
//! [`Occurrence`](crate::Occurrence)) is defined on the normalized value, not on the text the
//! caller supplied.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{OccurrenceError, Result};

/// How a pattern's text is turned into a search key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Literal text bounded by word boundaries (the `*` search of modal editors).
    Word,
    /// Literal text matched anywhere.
    Text,
    /// A raw regex, passed through untouched apart from newline escaping.
    Raw,
}

/// A normalized search key.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    value: String,
    kind: PatternKind,
}

fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\n")
}

impl Pattern {
    /// Normalize `text` according to `kind`.
    ///
    /// Fails with [`OccurrenceError::EmptyPattern`] for empty text.
    pub fn new(text: &str, kind: PatternKind) -> Result<Self> {
        if text.is_empty() {
            return Err(OccurrenceError::EmptyPattern);
        }

        let value = match kind {
            PatternKind::Raw => escape_newlines(text),
            PatternKind::Text => escape_newlines(&regex::escape(text)),
            PatternKind::Word => {
                let escaped = escape_newlines(&regex::escape(text));
                // A boundary is only meaningful next to a word character; `\b(` can never match.
                let lead = if text.chars().next().is_some_and(is_word_char) {
                    "\\b"
                } else {
                    ""
                };
                let trail = if text.chars().next_back().is_some_and(is_word_char) {
                    "\\b"
                } else {
                    ""
                };
                format!("{lead}{escaped}{trail}")
            }
        };

        Ok(Self {
            text: text.to_string(),
            value,
            kind,
        })
    }

    /// The text this pattern was created from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The normalized search key.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The kind used for normalization.
    pub fn kind(&self) -> PatternKind {
        self.kind
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
