//! Undo and dot-repeat bookkeeping.
//!
//! After an operator run that applied edits, the engine pushes an [`UndoRecord`] for the buffer.
//! When the host later reports a text change, [`UndoBridge::settle`] compares the buffer's undo
//! sequence number with the recorded ones and hands back every record whose edits were undone,
//! so the session can restore the patterns and marks it removed.

use std::collections::HashMap;

use crate::error::Result;
use crate::host::{BufferId, WindowId};
use crate::pattern::Pattern;
use crate::position::{Location, Span};

/// What an operator run removed, keyed by the undo sequence number it left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    /// Undo sequence number right after the run.
    pub seq: u64,
    /// Pattern snapshot at collection time.
    pub patterns: Vec<Pattern>,
    /// Serialized original spans of every processed mark.
    pub spans: Vec<String>,
}

impl UndoRecord {
    /// Decode the recorded spans.
    pub fn spans(&self) -> impl Iterator<Item = Result<Span>> + '_ {
        self.spans.iter().map(|key| Span::from_key(key))
    }
}

/// Per-buffer stacks of [`UndoRecord`]s.
#[derive(Debug, Default)]
pub struct UndoBridge {
    stacks: HashMap<BufferId, Vec<UndoRecord>>,
}

impl UndoBridge {
    /// Create an empty bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a record. Returns `true` if the buffer had no records before, meaning the caller
    /// has to start listening for text changes.
    pub fn push(&mut self, buffer: BufferId, record: UndoRecord) -> bool {
        let stack = self.stacks.entry(buffer).or_default();
        stack.push(record);
        stack.len() == 1
    }

    /// Number of records for `buffer`.
    pub fn depth(&self, buffer: BufferId) -> usize {
        self.stacks.get(&buffer).map_or(0, Vec::len)
    }

    /// Returns `true` while `buffer` has records and therefore needs change notifications.
    pub fn is_listening(&self, buffer: BufferId) -> bool {
        self.depth(buffer) > 0
    }

    /// Pop every record undone by moving the buffer to sequence number `current`.
    ///
    /// Records come back most recent first. Records at or below `current` stay: the edits they
    /// describe are still reachable by undo.
    pub fn settle(&mut self, buffer: BufferId, current: u64) -> Vec<UndoRecord> {
        let Some(stack) = self.stacks.get_mut(&buffer) else {
            return Vec::new();
        };

        let mut undone = Vec::new();
        while stack.last().is_some_and(|top| current < top.seq) {
            if let Some(record) = stack.pop() {
                log::debug!(
                    "buffer {buffer}: undo to {current} passed record {}",
                    record.seq
                );
                undone.push(record);
            }
        }
        if stack.is_empty() {
            self.stacks.remove(&buffer);
        }
        undone
    }

    /// Drop every record of `buffer`.
    pub fn forget(&mut self, buffer: BufferId) -> usize {
        self.stacks.remove(&buffer).map_or(0, |stack| stack.len())
    }
}

/// Cursor locations captured when the "repeat last change" key was pressed, per window.
#[derive(Debug, Default)]
pub struct RepeatCache {
    cursors: HashMap<WindowId, Location>,
}

impl RepeatCache {
    /// Remember the cursor of `window`.
    pub fn observe(&mut self, window: WindowId, cursor: Location) {
        self.cursors.insert(window, cursor);
    }

    /// The cached cursor of `window`, if any.
    pub fn get(&self, window: WindowId) -> Option<Location> {
        self.cursors.get(&window).copied()
    }

    /// Remove and return the cached cursor of `window`.
    pub fn take(&mut self, window: WindowId) -> Option<Location> {
        self.cursors.remove(&window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;

    fn record(seq: u64) -> UndoRecord {
        UndoRecord {
            seq,
            patterns: vec![Pattern::new("foo", PatternKind::Word).unwrap()],
            spans: vec![
                Span::new(Location::new(0, 0), Location::new(0, 3))
                    .unwrap()
                    .key(),
            ],
        }
    }

    #[test]
    fn test_push_reports_first_record() {
        let mut bridge = UndoBridge::new();
        let buffer = BufferId(1);
        assert!(bridge.push(buffer, record(3)));
        assert!(!bridge.push(buffer, record(5)));
        assert_eq!(bridge.depth(buffer), 2);
        assert!(bridge.is_listening(buffer));
    }

    #[test]
    fn test_settle_pops_every_undone_record() {
        let mut bridge = UndoBridge::new();
        let buffer = BufferId(1);
        bridge.push(buffer, record(3));
        bridge.push(buffer, record(5));
        bridge.push(buffer, record(8));

        // Forward progress keeps everything.
        assert!(bridge.settle(buffer, 9).is_empty());
        assert_eq!(bridge.depth(buffer), 3);

        // Two undo steps at once unwind two records, most recent first.
        let undone: Vec<u64> = bridge.settle(buffer, 4).iter().map(|r| r.seq).collect();
        assert_eq!(undone, vec![8, 5]);
        assert_eq!(bridge.depth(buffer), 1);

        assert_eq!(bridge.settle(buffer, 0).len(), 1);
        assert!(!bridge.is_listening(buffer));
    }

    #[test]
    fn test_record_spans_decode() {
        let spans: Vec<Span> = record(1).spans().collect::<Result<_>>().unwrap();
        assert_eq!(
            spans,
            vec![Span::new(Location::new(0, 0), Location::new(0, 3)).unwrap()]
        );
    }

    #[test]
    fn test_repeat_cache_is_per_window() {
        let mut cache = RepeatCache::default();
        cache.observe(WindowId(1), Location::new(2, 3));
        cache.observe(WindowId(2), Location::new(4, 0));
        assert_eq!(cache.take(WindowId(1)), Some(Location::new(2, 3)));
        assert_eq!(cache.take(WindowId(1)), None);
        assert_eq!(cache.get(WindowId(2)), Some(Location::new(4, 0)));
    }
}
