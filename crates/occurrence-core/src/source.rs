//! Where new patterns come from.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::host::{Host, WindowId};
use crate::pattern::PatternKind;

/// A place to read pattern text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    /// The word at or after the cursor, matched on word boundaries.
    WordUnderCursor,
    /// The text of the visual selection, matched literally.
    Selection,
    /// The host's last search, used as a regex.
    LastSearch,
}

impl PatternSource {
    /// How text from this source is matched.
    pub fn kind(self) -> PatternKind {
        match self {
            Self::WordUnderCursor => PatternKind::Word,
            Self::Selection => PatternKind::Text,
            Self::LastSearch => PatternKind::Raw,
        }
    }

    /// Read the text. Absence is logged and reported as `Ok(None)`.
    pub fn read<H: Host + ?Sized>(self, host: &H, window: WindowId) -> Result<Option<String>> {
        match self {
            Self::WordUnderCursor => word_under_cursor(host, window),
            Self::Selection => selection_text(host, window),
            Self::LastSearch => Ok(last_search(host)),
        }
    }
}

/// The first word that ends after the cursor column on the cursor line.
pub fn word_under_cursor<H: Host + ?Sized>(host: &H, window: WindowId) -> Result<Option<String>> {
    let buffer = host.window_buffer(window)?;
    let cursor = host.cursor(window)?;
    let line = host.line(buffer, cursor.line)?;

    let mut column = 0;
    for (_, segment) in line.split_word_bound_indices() {
        let width = segment.chars().count();
        let end = column + width;
        if end > cursor.column && segment.chars().any(is_word_char) {
            return Ok(Some(segment.to_string()));
        }
        column = end;
    }

    log::warn!("no word under cursor at {cursor}");
    Ok(None)
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Text of the window's selection, lines joined by `'\n'`.
pub fn selection_text<H: Host + ?Sized>(host: &H, window: WindowId) -> Result<Option<String>> {
    let buffer = host.window_buffer(window)?;
    let Some(selection) = host.selection(window)?.filter(|s| !s.is_empty()) else {
        log::warn!("window {window} has no selection");
        return Ok(None);
    };
    let text = host.text(buffer, selection)?.join("\n");
    if text.is_empty() {
        log::warn!("selection {selection} is empty");
        return Ok(None);
    }
    Ok(Some(text))
}

/// The host's last search pattern.
pub fn last_search<H: Host + ?Sized>(host: &H) -> Option<String> {
    let found = host.last_search().filter(|pattern| !pattern.is_empty());
    if found.is_none() {
        log::warn!("no previous search pattern");
    }
    found
}
