//! Buffer locations and spans.
//!
//! A [`Location`] is a zero-based `(line, column)` pair where `column` counts characters
//! (Unicode scalar values) within the line. A [`Span`] is a half-open `[start, stop)` pair of
//! locations carrying a [`SpanKind`] that only matters for containment tests of block spans.
//!
//! Spans serialize to a fixed-width key whose lexicographic order equals the span order, which
//! is what the anchor registries use as their stable identity.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{OccurrenceError, Result};

/// A zero-based buffer location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    /// Zero-based line index.
    pub line: usize,
    /// Zero-based column in characters within the line.
    pub column: usize,
}

impl Location {
    /// The first location of every buffer.
    pub const ZERO: Self = Self { line: 0, column: 0 };

    /// Create a new location.
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Returns the location shifted by `columns` characters on the same line.
    pub fn right(self, columns: usize) -> Self {
        Self::new(self.line, self.column + columns)
    }

    /// Returns the location shifted back by `columns` characters, stopping at column 0.
    pub fn left(self, columns: usize) -> Self {
        Self::new(self.line, self.column.saturating_sub(columns))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.column)
    }
}

/// Shape of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Characterwise range.
    #[default]
    Char,
    /// Linewise range.
    Line,
    /// Rectangular (blockwise) range.
    Block,
}

impl SpanKind {
    fn tag(self) -> char {
        match self {
            Self::Char => 'c',
            Self::Line => 'l',
            Self::Block => 'r',
        }
    }

    fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'c' => Some(Self::Char),
            'l' => Some(Self::Line),
            'r' => Some(Self::Block),
            _ => None,
        }
    }
}

/// A half-open range of buffer locations.
///
/// Invariant: `start <= stop`. The fields are private so the invariant can only be established
/// through [`Span::new`] / [`Span::with_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    start: Location,
    stop: Location,
    kind: SpanKind,
}

const KEY_WIDTH: usize = 16;
// "<line>:<col>-<line>:<col><kind>"
const KEY_LEN: usize = KEY_WIDTH * 4 + 4;

impl Span {
    /// Create a characterwise span.
    ///
    /// Fails with [`OccurrenceError::InvalidSpan`] when `start > stop`.
    pub fn new(start: Location, stop: Location) -> Result<Self> {
        Self::with_kind(start, stop, SpanKind::Char)
    }

    /// Create a span of the given kind.
    pub fn with_kind(start: Location, stop: Location, kind: SpanKind) -> Result<Self> {
        if start > stop {
            return Err(OccurrenceError::InvalidSpan { start, stop });
        }
        Ok(Self { start, stop, kind })
    }

    /// Create an empty span at `at`.
    pub fn point(at: Location) -> Self {
        Self {
            start: at,
            stop: at,
            kind: SpanKind::Char,
        }
    }

    /// Inclusive start.
    pub fn start(&self) -> Location {
        self.start
    }

    /// Exclusive stop.
    pub fn stop(&self) -> Location {
        self.stop
    }

    /// The span's shape.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the same range with another kind.
    pub fn as_kind(self, kind: SpanKind) -> Self {
        Self { kind, ..self }
    }

    /// Returns `true` if `start == stop`.
    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Returns `true` if the span covers more than one line.
    pub fn is_multiline(&self) -> bool {
        self.start.line != self.stop.line
    }

    fn columns(&self) -> (usize, usize) {
        (
            self.start.column.min(self.stop.column),
            self.start.column.max(self.stop.column),
        )
    }

    /// Returns `true` if `at` lies inside this span.
    ///
    /// Block spans test the rectangle spanned by their corners; other kinds test the linear
    /// half-open range.
    pub fn contains(&self, at: Location) -> bool {
        match self.kind {
            SpanKind::Block => {
                let (left, right) = self.columns();
                (self.start.line..=self.stop.line).contains(&at.line)
                    && (left..right).contains(&at.column)
            }
            SpanKind::Char | SpanKind::Line => self.start <= at && at < self.stop,
        }
    }

    /// Returns `true` if `other` lies entirely inside this span.
    pub fn contains_span(&self, other: &Span) -> bool {
        match self.kind {
            SpanKind::Block => {
                let (left, right) = self.columns();
                let (other_left, other_right) = other.columns();
                other.start.line >= self.start.line
                    && other.stop.line <= self.stop.line
                    && other_left >= left
                    && other_right <= right
            }
            SpanKind::Char | SpanKind::Line => self.start <= other.start && other.stop <= self.stop,
        }
    }

    /// Returns `true` if the two spans share at least one location.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    /// Moves the span so it begins at `start`, preserving its extent.
    ///
    /// Single-line spans keep their width; multi-line spans keep their line count and the
    /// column of their stop.
    pub fn translate(&self, start: Location) -> Span {
        let stop = if self.is_multiline() {
            Location::new(start.line + (self.stop.line - self.start.line), self.stop.column)
        } else {
            start.right(self.stop.column - self.start.column)
        };
        Span {
            start,
            stop,
            kind: self.kind,
        }
    }

    /// Serialize to a fixed-width key that sorts like the span itself.
    pub fn key(&self) -> String {
        format!(
            "{:016x}:{:016x}-{:016x}:{:016x}{}",
            self.start.line,
            self.start.column,
            self.stop.line,
            self.stop.column,
            self.kind.tag()
        )
    }

    /// Parse a key produced by [`Span::key`].
    pub fn from_key(key: &str) -> Result<Span> {
        let invalid = || OccurrenceError::InvalidKey(key.to_string());
        if key.len() != KEY_LEN || !key.is_ascii() {
            return Err(invalid());
        }

        let field = |idx: usize| -> Result<usize> {
            let start = idx * (KEY_WIDTH + 1);
            usize::from_str_radix(&key[start..start + KEY_WIDTH], 16).map_err(|_| invalid())
        };
        let separators = [
            (KEY_WIDTH, ':'),
            (KEY_WIDTH * 2 + 1, '-'),
            (KEY_WIDTH * 3 + 2, ':'),
        ];
        if separators
            .iter()
            .any(|&(idx, sep)| key.as_bytes()[idx] != sep as u8)
        {
            return Err(invalid());
        }

        let kind = key
            .chars()
            .last()
            .and_then(SpanKind::from_tag)
            .ok_or_else(invalid)?;
        let start = Location::new(field(0)?, field(1)?);
        let stop = Location::new(field(2)?, field(3)?);
        Span::with_kind(start, stop, kind).map_err(|_| invalid())
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.stop.cmp(&other.stop))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}
