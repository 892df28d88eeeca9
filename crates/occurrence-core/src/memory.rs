//! In-memory reference host.
//!
//! [`MemoryHost`] implements every [`Host`] primitive without an editor around it:
//!
//! - buffers are [`LineIndex`] ropes with an [`AnchorStore`] adjusted on every edit
//! - each buffer keeps a linear undo history whose steps carry increasing sequence numbers
//! - key replay dispatches whole key sequences to handlers (`d`, `y`, `gU`, `gu`, `g~` are
//!   built in; [`MemoryHost::bind_keys`] adds more)
//! - text-change notifications are queued for listening buffers and drained with
//!   [`MemoryHost::take_changes`]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::error::{OccurrenceError, Result};
use crate::host::{
    AnchorId, BufferId, Host, NamespaceId, RegisterContents, ReplayFlags, SearchFlags, WindowId,
};
use crate::line_index::LineIndex;
use crate::pattern::Pattern;
use crate::position::{Location, Span, SpanKind};
use crate::search::{self, CharIndex};
use crate::tracking::{AnchorStore, TrackedRange};

/// Handler executed by [`Host::feed_keys`] for a bound key sequence.
///
/// Receives the target span: the window's selection, or an empty span at the cursor.
pub type KeyHandler = dyn Fn(&mut MemoryHost, WindowId, Span, ReplayFlags) -> Result<()>;

#[derive(Debug, Clone)]
struct TextEdit {
    start: usize,
    deleted: String,
    inserted: String,
}

#[derive(Debug, Clone)]
struct UndoStep {
    seq: u64,
    edits: Vec<TextEdit>,
}

#[derive(Debug, Default)]
struct History {
    undo_stack: Vec<UndoStep>,
    redo_stack: Vec<UndoStep>,
    next_seq: u64,
}

impl History {
    fn seq(&self) -> u64 {
        self.undo_stack.last().map_or(0, |step| step.seq)
    }

    fn record(&mut self, edit: TextEdit, join: bool) {
        self.redo_stack.clear();
        if join && let Some(step) = self.undo_stack.last_mut() {
            step.edits.push(edit);
            return;
        }
        self.next_seq += 1;
        self.undo_stack.push(UndoStep {
            seq: self.next_seq,
            edits: vec![edit],
        });
    }
}

struct SearchText {
    text: String,
    index: CharIndex,
}

struct Buffer {
    text: LineIndex,
    anchors: AnchorStore,
    history: History,
    search_text: RefCell<Option<Rc<SearchText>>>,
}

impl Buffer {
    fn new(text: &str) -> Self {
        Self {
            text: LineIndex::from_text(text),
            anchors: AnchorStore::default(),
            history: History::default(),
            search_text: RefCell::new(None),
        }
    }

    fn search_text(&self) -> Rc<SearchText> {
        let mut cached = self.search_text.borrow_mut();
        let entry = cached.get_or_insert_with(|| {
            let text = self.text.text();
            let index = CharIndex::new(&text);
            Rc::new(SearchText { text, index })
        });
        Rc::clone(entry)
    }

    fn chars(&self, span: Span) -> Result<(usize, usize)> {
        Ok((self.text.to_char(span.start())?, self.text.to_char(span.stop())?))
    }

    fn span(&self, start: usize, end: usize, kind: SpanKind) -> Result<Span> {
        Span::with_kind(self.text.to_location(start), self.text.to_location(end), kind)
    }

    /// Replace `[start, end)` and keep anchors in step. Returns the deleted text.
    fn splice(&mut self, start: usize, end: usize, inserted: &str) -> String {
        let deleted = self.text.slice(start, end);
        if end > start {
            self.text.delete(start, end);
            self.anchors.update_for_deletion(start, end);
        }
        let len = inserted.chars().count();
        if len > 0 {
            self.text.insert(start, inserted);
            self.anchors.update_for_insertion(start, len);
        }
        self.search_text.replace(None);
        deleted
    }

    fn edit(&mut self, start: usize, end: usize, inserted: &str, join: bool) {
        let deleted = self.splice(start, end, inserted);
        self.history.record(
            TextEdit {
                start,
                deleted,
                inserted: inserted.to_string(),
            },
            join,
        );
    }
}

struct Window {
    buffer: BufferId,
    cursor: Location,
    selection: Option<Span>,
}

/// A complete [`Host`] backed by in-memory buffers.
pub struct MemoryHost {
    buffers: HashMap<BufferId, Buffer>,
    windows: HashMap<WindowId, Window>,
    registers: HashMap<String, RegisterContents>,
    handlers: HashMap<String, Rc<KeyHandler>>,
    mappings: HashMap<String, String>,
    regexes: RefCell<HashMap<String, Regex>>,
    listening: HashSet<BufferId>,
    changes: Vec<BufferId>,
    repeat_handler: Option<String>,
    last_search: Option<String>,
    count: usize,
    next_buffer: u64,
    next_window: u64,
    next_namespace: u32,
    next_anchor: u64,
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("buffers", &self.buffers.len())
            .field("windows", &self.windows.len())
            .field("registers", &self.registers)
            .field("handlers", &self.handlers.len())
            .field("repeat_handler", &self.repeat_handler)
            .finish()
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create a host with the built-in key handlers bound.
    pub fn new() -> Self {
        let mut host = Self {
            buffers: HashMap::new(),
            windows: HashMap::new(),
            registers: HashMap::new(),
            handlers: HashMap::new(),
            mappings: HashMap::new(),
            regexes: RefCell::new(HashMap::new()),
            listening: HashSet::new(),
            changes: Vec::new(),
            repeat_handler: None,
            last_search: None,
            count: 0,
            next_buffer: 0,
            next_window: 0,
            next_namespace: 0,
            next_anchor: 0,
        };
        host.bind_keys("d", delete);
        host.bind_keys("y", yank);
        host.bind_keys("gU", |host, window, span, flags| {
            map_case(host, window, span, flags, str::to_uppercase)
        });
        host.bind_keys("gu", |host, window, span, flags| {
            map_case(host, window, span, flags, str::to_lowercase)
        });
        host.bind_keys("g~", |host, window, span, flags| {
            map_case(host, window, span, flags, toggle_case)
        });
        host
    }

    /// Create a buffer holding `text`.
    pub fn add_buffer(&mut self, text: &str) -> BufferId {
        self.next_buffer += 1;
        let id = BufferId(self.next_buffer);
        self.buffers.insert(id, Buffer::new(text));
        id
    }

    /// Open a window on `buffer` with the cursor at the start.
    pub fn open_window(&mut self, buffer: BufferId) -> WindowId {
        self.next_window += 1;
        let id = WindowId(self.next_window);
        self.windows.insert(
            id,
            Window {
                buffer,
                cursor: Location::ZERO,
                selection: None,
            },
        );
        id
    }

    /// The whole text of `buffer`.
    pub fn buffer_text(&self, buffer: BufferId) -> Result<String> {
        Ok(self.buffer(buffer)?.text.text())
    }

    /// Every line of `buffer`.
    pub fn lines(&self, buffer: BufferId) -> Result<Vec<String>> {
        let text = &self.buffer(buffer)?.text;
        Ok((0..text.line_count())
            .filter_map(|line| text.line(line))
            .collect())
    }

    /// Undo the most recent step of `buffer`. Returns whether there was one.
    pub fn undo(&mut self, buffer: BufferId) -> Result<bool> {
        let buf = self.buffer_mut(buffer)?;
        let Some(step) = buf.history.undo_stack.pop() else {
            return Ok(false);
        };
        for edit in step.edits.iter().rev() {
            let end = edit.start + edit.inserted.chars().count();
            buf.splice(edit.start, end, &edit.deleted);
        }
        buf.history.redo_stack.push(step);
        self.notify(buffer);
        Ok(true)
    }

    /// Redo the most recently undone step of `buffer`. Returns whether there was one.
    pub fn redo(&mut self, buffer: BufferId) -> Result<bool> {
        let buf = self.buffer_mut(buffer)?;
        let Some(step) = buf.history.redo_stack.pop() else {
            return Ok(false);
        };
        for edit in &step.edits {
            let end = edit.start + edit.deleted.chars().count();
            buf.splice(edit.start, end, &edit.inserted);
        }
        buf.history.undo_stack.push(step);
        self.notify(buffer);
        Ok(true)
    }

    /// Bind a key sequence to a handler, replacing any previous binding.
    pub fn bind_keys<F>(&mut self, keys: &str, handler: F)
    where
        F: Fn(&mut MemoryHost, WindowId, Span, ReplayFlags) -> Result<()> + 'static,
    {
        self.handlers.insert(keys.to_string(), Rc::new(handler));
    }

    /// Map `from` to `to` for replays with [`ReplayFlags::remap`] set.
    pub fn map_keys(&mut self, from: &str, to: &str) {
        self.mappings.insert(from.to_string(), to.to_string());
    }

    /// Set the count typed before the pending operator.
    pub fn set_count(&mut self, count: usize) {
        self.count = count;
    }

    /// Set the most recent search pattern.
    pub fn set_last_search(&mut self, pattern: Option<String>) {
        self.last_search = pattern;
    }

    /// Drain queued text-change notifications, oldest first.
    pub fn take_changes(&mut self) -> Vec<BufferId> {
        std::mem::take(&mut self.changes)
    }

    /// Returns `true` if change notifications are delivered for `buffer`.
    pub fn is_listening(&self, buffer: BufferId) -> bool {
        self.listening.contains(&buffer)
    }

    fn buffer(&self, buffer: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(&buffer)
            .ok_or(OccurrenceError::UnknownBuffer(buffer))
    }

    fn buffer_mut(&mut self, buffer: BufferId) -> Result<&mut Buffer> {
        self.buffers
            .get_mut(&buffer)
            .ok_or(OccurrenceError::UnknownBuffer(buffer))
    }

    fn window(&self, window: WindowId) -> Result<&Window> {
        self.windows
            .get(&window)
            .ok_or(OccurrenceError::UnknownWindow(window))
    }

    fn window_mut(&mut self, window: WindowId) -> Result<&mut Window> {
        self.windows
            .get_mut(&window)
            .ok_or(OccurrenceError::UnknownWindow(window))
    }

    fn notify(&mut self, buffer: BufferId) {
        if self.listening.contains(&buffer) {
            self.changes.push(buffer);
        }
    }

    fn regex(&self, value: &str) -> Result<Regex> {
        if let Some(re) = self.regexes.borrow().get(value) {
            return Ok(re.clone());
        }
        let re = search::compile(value, false)?;
        self.regexes
            .borrow_mut()
            .insert(value.to_string(), re.clone());
        Ok(re)
    }

    fn check_location(&self, buffer: BufferId, at: Location) -> Result<()> {
        self.buffer(buffer)?.text.to_char(at).map(|_| ())
    }
}

impl Host for MemoryHost {
    fn line_count(&self, buffer: BufferId) -> Result<usize> {
        Ok(self.buffer(buffer)?.text.line_count())
    }

    fn line(&self, buffer: BufferId, line: usize) -> Result<String> {
        self.buffer(buffer)?
            .text
            .line(line)
            .ok_or(OccurrenceError::OutOfBounds(Location::new(line, 0)))
    }

    fn line_len(&self, buffer: BufferId, line: usize) -> Result<usize> {
        self.buffer(buffer)?
            .text
            .line_len(line)
            .ok_or(OccurrenceError::OutOfBounds(Location::new(line, 0)))
    }

    fn text(&self, buffer: BufferId, span: Span) -> Result<Vec<String>> {
        let buf = self.buffer(buffer)?;
        if span.kind() == SpanKind::Block {
            let left = span.start().column.min(span.stop().column);
            let right = span.start().column.max(span.stop().column);
            return (span.start().line..=span.stop().line)
                .map(|line| {
                    let start = buf.text.to_char(Location::new(line, left))?;
                    let end = buf.text.to_char(Location::new(line, right))?;
                    Ok(buf.text.slice(start, end))
                })
                .collect();
        }
        let (start, end) = buf.chars(span)?;
        Ok(buf
            .text
            .slice(start, end)
            .split('\n')
            .map(str::to_string)
            .collect())
    }

    fn replace(
        &mut self,
        buffer: BufferId,
        span: Span,
        lines: &[String],
        join_undo: bool,
    ) -> Result<()> {
        let buf = self.buffer_mut(buffer)?;
        if span.kind() == SpanKind::Block {
            let rows = span.stop().line - span.start().line + 1;
            if lines.len() != rows {
                return Err(OccurrenceError::Host(format!(
                    "block replacement needs {rows} lines, got {}",
                    lines.len()
                )));
            }
            let left = span.start().column.min(span.stop().column);
            let right = span.start().column.max(span.stop().column);
            // Bottom row first so earlier rows keep their offsets.
            for (n, (row, text)) in lines.iter().enumerate().rev().enumerate() {
                let line = span.start().line + row;
                let start = buf.text.to_char(Location::new(line, left))?;
                let end = buf.text.to_char(Location::new(line, right))?;
                buf.edit(start, end, text, join_undo || n > 0);
            }
        } else {
            let (start, end) = buf.chars(span)?;
            buf.edit(start, end, &lines.join("\n"), join_undo);
        }
        self.notify(buffer);
        Ok(())
    }

    fn window_buffer(&self, window: WindowId) -> Result<BufferId> {
        Ok(self.window(window)?.buffer)
    }

    fn cursor(&self, window: WindowId) -> Result<Location> {
        Ok(self.window(window)?.cursor)
    }

    fn set_cursor(&mut self, window: WindowId, at: Location) -> Result<()> {
        let buffer = self.window(window)?.buffer;
        self.check_location(buffer, at)?;
        self.window_mut(window)?.cursor = at;
        Ok(())
    }

    fn selection(&self, window: WindowId) -> Result<Option<Span>> {
        Ok(self.window(window)?.selection)
    }

    fn set_selection(&mut self, window: WindowId, span: Span) -> Result<()> {
        let buffer = self.window(window)?.buffer;
        self.check_location(buffer, span.start())?;
        self.check_location(buffer, span.stop())?;
        self.window_mut(window)?.selection = Some(span);
        Ok(())
    }

    fn search(
        &self,
        buffer: BufferId,
        pattern: &Pattern,
        from: Location,
        flags: SearchFlags,
    ) -> Result<Option<Span>> {
        let buf = self.buffer(buffer)?;
        let re = self.regex(pattern.as_str())?;
        let haystack = buf.search_text();
        let (text, index) = (haystack.text.as_str(), &haystack.index);
        let from = buf.text.to_char(from)?;

        let found = if flags.backward {
            search::find_prev(text, index, &re, from, flags.accept_at_cursor).or_else(|| {
                flags
                    .wrap
                    .then(|| search::find_prev(text, index, &re, index.char_count(), true))
                    .flatten()
            })
        } else {
            search::find_next(text, index, &re, from, flags.accept_at_cursor).or_else(|| {
                flags
                    .wrap
                    .then(|| search::find_next(text, index, &re, 0, true))
                    .flatten()
            })
        };

        found
            .map(|m| buf.span(m.start, m.end, SpanKind::Char))
            .transpose()
    }

    fn last_search(&self) -> Option<String> {
        self.last_search.clone()
    }

    fn create_namespace(&mut self, name: &str) -> NamespaceId {
        self.next_namespace += 1;
        log::trace!("namespace {} = {name:?}", self.next_namespace);
        NamespaceId(self.next_namespace)
    }

    fn anchor_set(
        &mut self,
        buffer: BufferId,
        namespace: NamespaceId,
        id: Option<AnchorId>,
        span: Span,
    ) -> Result<AnchorId> {
        let id = match id {
            Some(id) => id,
            None => {
                self.next_anchor += 1;
                AnchorId(self.next_anchor)
            }
        };
        let buf = self.buffer_mut(buffer)?;
        let (start, end) = buf.chars(span)?;
        buf.anchors.set(
            namespace,
            id,
            TrackedRange {
                start,
                end,
                kind: span.kind(),
            },
        );
        Ok(id)
    }

    fn anchor_get(
        &self,
        buffer: BufferId,
        namespace: NamespaceId,
        id: AnchorId,
    ) -> Result<Option<Span>> {
        let buf = self.buffer(buffer)?;
        buf.anchors
            .get(namespace, id)
            .map(|range| buf.span(range.start, range.end, range.kind))
            .transpose()
    }

    fn anchor_delete(
        &mut self,
        buffer: BufferId,
        namespace: NamespaceId,
        id: AnchorId,
    ) -> Result<bool> {
        Ok(self.buffer_mut(buffer)?.anchors.delete(namespace, id))
    }

    fn anchors_in(
        &self,
        buffer: BufferId,
        namespace: NamespaceId,
        bounds: Option<Span>,
    ) -> Result<Vec<(AnchorId, Span)>> {
        let buf = self.buffer(buffer)?;
        let mut found = Vec::new();
        for (id, range) in buf.anchors.iter(namespace) {
            let span = buf.span(range.start, range.end, range.kind)?;
            if bounds.is_none_or(|bounds| bounds.contains_span(&span)) {
                found.push((id, span));
            }
        }
        found.sort_by_key(|(id, span)| (*span, *id));
        Ok(found)
    }

    fn anchor_clear(&mut self, buffer: BufferId, namespace: NamespaceId) -> Result<()> {
        self.buffer_mut(buffer)?.anchors.clear(namespace);
        Ok(())
    }

    fn register(&self, name: &str) -> Option<RegisterContents> {
        self.registers.get(name).cloned()
    }

    fn set_register(&mut self, name: &str, contents: RegisterContents) -> Result<()> {
        self.registers.insert(name.to_string(), contents);
        Ok(())
    }

    fn undo_seq(&self, buffer: BufferId) -> Result<u64> {
        Ok(self.buffer(buffer)?.history.seq())
    }

    fn attach_change_listener(&mut self, buffer: BufferId) -> Result<()> {
        self.buffer(buffer)?;
        self.listening.insert(buffer);
        Ok(())
    }

    fn detach_change_listener(&mut self, buffer: BufferId) -> Result<()> {
        self.listening.remove(&buffer);
        Ok(())
    }

    fn feed_keys(&mut self, window: WindowId, keys: &str, flags: ReplayFlags) -> Result<()> {
        let keys = if flags.remap {
            self.mappings
                .get(keys)
                .cloned()
                .unwrap_or_else(|| keys.to_string())
        } else {
            keys.to_string()
        };
        let handler = self
            .handlers
            .get(&keys)
            .cloned()
            .ok_or_else(|| OccurrenceError::Host(format!("no handler bound to {keys:?}")))?;

        let target = {
            let w = self.window(window)?;
            w.selection.unwrap_or_else(|| Span::point(w.cursor))
        };
        handler(self, window, target, flags)?;

        self.window_mut(window)?.selection = None;
        self.repeat_handler = Some(format!("keys:{keys}"));
        Ok(())
    }

    fn repeat_handler(&self) -> Option<String> {
        self.repeat_handler.clone()
    }

    fn set_repeat_handler(&mut self, handler: Option<String>) {
        self.repeat_handler = handler;
    }

    fn count(&self) -> usize {
        self.count
    }
}

fn delete(host: &mut MemoryHost, window: WindowId, span: Span, flags: ReplayFlags) -> Result<()> {
    yank(host, window, span, flags)?;
    let buffer = host.window_buffer(window)?;
    let rows = if span.kind() == SpanKind::Block {
        span.stop().line - span.start().line + 1
    } else {
        1
    };
    host.replace(buffer, span, &vec![String::new(); rows], flags.join_undo)?;
    host.set_cursor(window, span.start())
}

fn yank(host: &mut MemoryHost, window: WindowId, span: Span, _flags: ReplayFlags) -> Result<()> {
    let buffer = host.window_buffer(window)?;
    let text = host.text(buffer, span)?.join("\n");
    host.set_register(
        "\"",
        RegisterContents {
            text,
            kind: span.kind(),
        },
    )?;
    host.set_cursor(window, span.start())
}

fn map_case(
    host: &mut MemoryHost,
    window: WindowId,
    span: Span,
    flags: ReplayFlags,
    map: fn(&str) -> String,
) -> Result<()> {
    let buffer = host.window_buffer(window)?;
    let lines: Vec<String> = host
        .text(buffer, span)?
        .iter()
        .map(|line| map(line))
        .collect();
    host.replace(buffer, span, &lines, flags.join_undo)?;
    host.set_cursor(window, span.start())
}

fn toggle_case(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                c.to_uppercase().collect::<Vec<_>>()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;

    fn span(l0: usize, c0: usize, l1: usize, c1: usize) -> Span {
        Span::new(Location::new(l0, c0), Location::new(l1, c1)).unwrap()
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_replace_multiline_and_read_back() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("foo bar\nbaz foo");
        host.replace(buffer, span(0, 4, 1, 3), &lines(&["X", "Y"]), false)
            .unwrap();
        assert_eq!(host.lines(buffer).unwrap(), lines(&["foo X", "Y foo"]));
        assert_eq!(
            host.text(buffer, span(0, 2, 1, 1)).unwrap(),
            lines(&["o X", "Y"])
        );
    }

    #[test]
    fn test_undo_steps_join_and_sequence_numbers() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("a b c");
        assert_eq!(host.undo_seq(buffer).unwrap(), 0);

        host.replace(buffer, span(0, 4, 0, 5), &lines(&["C"]), false)
            .unwrap();
        host.replace(buffer, span(0, 0, 0, 1), &lines(&["A"]), true)
            .unwrap();
        assert_eq!(host.undo_seq(buffer).unwrap(), 1);
        host.replace(buffer, span(0, 2, 0, 3), &lines(&["B"]), false)
            .unwrap();
        assert_eq!(host.undo_seq(buffer).unwrap(), 2);
        assert_eq!(host.buffer_text(buffer).unwrap(), "A B C");

        assert!(host.undo(buffer).unwrap());
        assert_eq!(host.undo_seq(buffer).unwrap(), 1);
        assert!(host.undo(buffer).unwrap());
        assert_eq!(host.undo_seq(buffer).unwrap(), 0);
        assert_eq!(host.buffer_text(buffer).unwrap(), "a b c");
        assert!(!host.undo(buffer).unwrap());

        assert!(host.redo(buffer).unwrap());
        assert_eq!(host.buffer_text(buffer).unwrap(), "A b C");

        // A new edit after undo gets a fresh, larger number.
        host.replace(buffer, span(0, 1, 0, 2), &lines(&["-"]), false)
            .unwrap();
        assert_eq!(host.undo_seq(buffer).unwrap(), 3);
        assert!(!host.redo(buffer).unwrap());
    }

    #[test]
    fn test_anchors_follow_edits_and_undo() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("foo bar foo");
        let ns = host.create_namespace("test");
        let id = host
            .anchor_set(buffer, ns, None, span(0, 8, 0, 11))
            .unwrap();

        host.replace(buffer, span(0, 0, 0, 4), &lines(&[""]), false)
            .unwrap();
        assert_eq!(
            host.anchor_get(buffer, ns, id).unwrap(),
            Some(span(0, 4, 0, 7))
        );

        host.undo(buffer).unwrap();
        assert_eq!(
            host.anchor_get(buffer, ns, id).unwrap(),
            Some(span(0, 8, 0, 11))
        );
    }

    #[test]
    fn test_search_flags() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("foo x\nfoo");
        let foo = Pattern::new("foo", PatternKind::Word).unwrap();

        let at = |host: &MemoryHost, from, flags| host.search(buffer, &foo, from, flags).unwrap();
        assert_eq!(
            at(&host, Location::ZERO, SearchFlags::forward(true)),
            Some(span(0, 0, 0, 3))
        );
        assert_eq!(
            at(&host, Location::ZERO, SearchFlags::forward(false)),
            Some(span(1, 0, 1, 3))
        );
        assert_eq!(at(&host, Location::new(1, 0), SearchFlags::forward(false)), None);
        assert_eq!(
            at(
                &host,
                Location::new(1, 0),
                SearchFlags::forward(false).wrapping(true)
            ),
            Some(span(0, 0, 0, 3))
        );
        assert_eq!(
            at(&host, Location::new(1, 0), SearchFlags::backward(false)),
            Some(span(0, 0, 0, 3))
        );
        assert_eq!(
            at(
                &host,
                Location::ZERO,
                SearchFlags::backward(false).wrapping(true)
            ),
            Some(span(1, 0, 1, 3))
        );
    }

    #[test]
    fn test_builtin_replay_handlers() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("Foo bar");
        let window = host.open_window(buffer);

        host.set_selection(window, span(0, 0, 0, 3)).unwrap();
        host.feed_keys(window, "g~", ReplayFlags::default()).unwrap();
        assert_eq!(host.buffer_text(buffer).unwrap(), "fOO bar");
        assert_eq!(host.selection(window).unwrap(), None);
        assert_eq!(host.repeat_handler().as_deref(), Some("keys:g~"));

        host.set_selection(window, span(0, 3, 0, 7)).unwrap();
        host.feed_keys(window, "d", ReplayFlags::default()).unwrap();
        assert_eq!(host.buffer_text(buffer).unwrap(), "fOO");
        assert_eq!(host.register("\"").unwrap().text, " bar");
    }

    #[test]
    fn test_unbound_keys_fail_and_remap_resolves() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("abc");
        let window = host.open_window(buffer);
        assert!(matches!(
            host.feed_keys(window, "zz", ReplayFlags::default()),
            Err(OccurrenceError::Host(_))
        ));

        host.map_keys("U", "gU");
        host.set_selection(window, span(0, 0, 0, 3)).unwrap();
        let remap = ReplayFlags {
            remap: true,
            join_undo: false,
        };
        host.feed_keys(window, "U", remap).unwrap();
        assert_eq!(host.buffer_text(buffer).unwrap(), "ABC");
    }

    #[test]
    fn test_changes_are_queued_only_while_listening() {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer("abc");
        host.replace(buffer, span(0, 0, 0, 1), &lines(&["x"]), false)
            .unwrap();
        assert!(host.take_changes().is_empty());

        host.attach_change_listener(buffer).unwrap();
        host.undo(buffer).unwrap();
        assert_eq!(host.take_changes(), vec![buffer]);

        host.detach_change_listener(buffer).unwrap();
        host.redo(buffer).unwrap();
        assert!(host.take_changes().is_empty());
    }
}
