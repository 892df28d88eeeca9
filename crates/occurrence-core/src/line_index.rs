//! Rope-backed buffer text with line/column addressing.
//!
//! Lines are separated by `'\n'`. A buffer always has at least one (possibly empty) line.

use ropey::Rope;

use crate::error::{OccurrenceError, Result};
use crate::position::Location;

/// Buffer text indexed by line.
///
/// Rope provides O(log N) line access, insertion, and deletion.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    rope: Rope,
}

impl LineIndex {
    /// Build a line index from text.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Total line count.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Total character count.
    pub fn char_count(&self) -> usize {
        self.rope.len_chars()
    }

    /// Text of one line, without its newline.
    pub fn line(&self, line: usize) -> Option<String> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let mut text = self.rope.line(line).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        Some(text)
    }

    /// Length of one line in characters, without its newline.
    pub fn line_len(&self, line: usize) -> Option<usize> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let start = self.rope.line_to_char(line);
        let len = if line + 1 < self.rope.len_lines() {
            self.rope.line_to_char(line + 1) - start - 1
        } else {
            self.rope.len_chars() - start
        };
        Some(len)
    }

    /// Character offset of `at`. Columns past the end of the line are clamped.
    pub fn to_char(&self, at: Location) -> Result<usize> {
        let len = self
            .line_len(at.line)
            .ok_or(OccurrenceError::OutOfBounds(at))?;
        Ok(self.rope.line_to_char(at.line) + at.column.min(len))
    }

    /// Location of a character offset (clamped to the end of the text).
    pub fn to_location(&self, char_offset: usize) -> Location {
        let char_offset = char_offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(char_offset);
        Location::new(line, char_offset - self.rope.line_to_char(line))
    }

    /// Text between two character offsets.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.rope.len_chars());
        let start = start.min(end);
        self.rope.slice(start..end).to_string()
    }

    /// Insert text at a character offset.
    pub fn insert(&mut self, char_offset: usize, text: &str) {
        let char_offset = char_offset.min(self.rope.len_chars());
        self.rope.insert(char_offset, text);
    }

    /// Delete a character range.
    pub fn delete(&mut self, start: usize, end: usize) {
        let end = end.min(self.rope.len_chars());
        if start < end {
            self.rope.remove(start..end);
        }
    }

    /// The complete text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_one_line() {
        let index = LineIndex::from_text("");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.line(0).as_deref(), Some(""));
        assert_eq!(index.line(1), None);
    }

    #[test]
    fn test_location_conversion_round_trip() {
        let index = LineIndex::from_text("ABC\nDEF\nGHI");
        assert_eq!(index.to_char(Location::new(1, 0)).unwrap(), 4);
        assert_eq!(index.to_char(Location::new(2, 2)).unwrap(), 10);
        assert_eq!(index.to_location(4), Location::new(1, 0));
        assert_eq!(index.to_location(3), Location::new(0, 3));
        assert_eq!(index.to_location(99), Location::new(2, 3));
    }

    #[test]
    fn test_columns_clamp_and_lines_do_not() {
        let index = LineIndex::from_text("ab\ncd");
        assert_eq!(index.to_char(Location::new(0, 10)).unwrap(), 2);
        assert_eq!(
            index.to_char(Location::new(5, 0)).unwrap_err(),
            OccurrenceError::OutOfBounds(Location::new(5, 0))
        );
    }

    #[test]
    fn test_cjk_lines() {
        let index = LineIndex::from_text("你好\n世界");
        assert_eq!(index.line_len(0), Some(2));
        assert_eq!(index.to_location(3), Location::new(1, 0));
        assert_eq!(index.slice(1, 4), "好\n世");
    }

    #[test]
    fn test_insert_and_delete() {
        let mut index = LineIndex::from_text("Hello World");
        index.insert(6, "Beautiful\n");
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.line(1).as_deref(), Some("World"));

        index.delete(5, 16);
        assert_eq!(index.text(), "HelloWorld");
    }
}
