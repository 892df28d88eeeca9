//! Anchor positions that follow edits.
//!
//! Anchors are stored as half-open character ranges per namespace and adjusted on every
//! insertion and deletion, the same way style intervals are shifted when text changes. An anchor
//! whose whole range is deleted collapses to an empty range at the deletion point instead of
//! disappearing; only its owner deletes it.

use std::collections::BTreeMap;

use crate::host::{AnchorId, NamespaceId};
use crate::position::SpanKind;

/// One tracked range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedRange {
    /// Inclusive start character offset.
    pub start: usize,
    /// Exclusive end character offset.
    pub end: usize,
    /// Shape of the span the anchor was created from.
    pub kind: SpanKind,
}

/// Tracked ranges of one buffer, grouped by namespace.
#[derive(Debug, Clone, Default)]
pub struct AnchorStore {
    namespaces: BTreeMap<NamespaceId, BTreeMap<AnchorId, TrackedRange>>,
}

impl AnchorStore {
    /// Create or move an anchor.
    pub fn set(&mut self, namespace: NamespaceId, id: AnchorId, range: TrackedRange) {
        self.namespaces
            .entry(namespace)
            .or_default()
            .insert(id, range);
    }

    /// Current range of an anchor.
    pub fn get(&self, namespace: NamespaceId, id: AnchorId) -> Option<TrackedRange> {
        self.namespaces.get(&namespace)?.get(&id).copied()
    }

    /// Delete an anchor. Returns whether it existed.
    pub fn delete(&mut self, namespace: NamespaceId, id: AnchorId) -> bool {
        self.namespaces
            .get_mut(&namespace)
            .is_some_and(|anchors| anchors.remove(&id).is_some())
    }

    /// Delete every anchor of a namespace.
    pub fn clear(&mut self, namespace: NamespaceId) {
        self.namespaces.remove(&namespace);
    }

    /// Every anchor of a namespace, in id order.
    pub fn iter(
        &self,
        namespace: NamespaceId,
    ) -> impl Iterator<Item = (AnchorId, TrackedRange)> + '_ {
        self.namespaces
            .get(&namespace)
            .into_iter()
            .flat_map(|anchors| anchors.iter().map(|(id, range)| (*id, *range)))
    }

    fn ranges_mut(&mut self) -> impl Iterator<Item = &mut TrackedRange> {
        self.namespaces
            .values_mut()
            .flat_map(|anchors| anchors.values_mut())
    }

    /// Shift anchors for `delta` characters inserted at `pos`.
    pub fn update_for_insertion(&mut self, pos: usize, delta: usize) {
        for range in self.ranges_mut() {
            if range.start >= pos {
                range.start += delta;
                range.end += delta;
            } else if range.end > pos {
                // The insertion lands inside the range; it grows.
                range.end += delta;
            }
        }
    }

    /// Shift anchors for the deletion of `[start, end)`.
    pub fn update_for_deletion(&mut self, start: usize, end: usize) {
        let delta = end - start;
        for range in self.ranges_mut() {
            if range.end <= start {
                continue;
            } else if range.start >= end {
                range.start -= delta;
                range.end -= delta;
            } else if range.start >= start && range.end <= end {
                range.start = start;
                range.end = start;
            } else if range.start < start && range.end > end {
                range.end -= delta;
            } else if range.start < start {
                range.end = start;
            } else {
                range.start = start;
                range.end -= delta;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: NamespaceId = NamespaceId(1);

    fn range(start: usize, end: usize) -> TrackedRange {
        TrackedRange {
            start,
            end,
            kind: SpanKind::Char,
        }
    }

    fn store(ranges: &[(usize, usize)]) -> AnchorStore {
        let mut store = AnchorStore::default();
        for (i, (start, end)) in ranges.iter().enumerate() {
            store.set(NS, AnchorId(i as u64), range(*start, *end));
        }
        store
    }

    fn ranges(store: &AnchorStore) -> Vec<(usize, usize)> {
        store.iter(NS).map(|(_, r)| (r.start, r.end)).collect()
    }

    #[test]
    fn test_insertion_shifts_and_grows() {
        let mut store = store(&[(10, 20), (30, 40), (0, 5)]);
        store.update_for_insertion(15, 5);
        assert_eq!(ranges(&store), vec![(10, 25), (35, 45), (0, 5)]);

        // Inserting exactly at a start pushes the whole range.
        store.update_for_insertion(35, 2);
        assert_eq!(ranges(&store), vec![(10, 25), (37, 47), (0, 5)]);
    }

    #[test]
    fn test_deletion_shrinks_and_collapses() {
        let mut store = store(&[(10, 20), (30, 40), (50, 60), (22, 28)]);
        store.update_for_deletion(21, 35);

        assert_eq!(ranges(&store), vec![(10, 20), (21, 26), (36, 46), (21, 21)]);
    }

    #[test]
    fn test_namespaces_are_independent() {
        let mut store = AnchorStore::default();
        store.set(NS, AnchorId(1), range(0, 3));
        store.set(NamespaceId(2), AnchorId(1), range(4, 7));

        assert!(store.delete(NS, AnchorId(1)));
        assert!(!store.delete(NS, AnchorId(1)));
        assert_eq!(store.get(NamespaceId(2), AnchorId(1)), Some(range(4, 7)));

        store.clear(NamespaceId(2));
        assert_eq!(store.iter(NamespaceId(2)).count(), 0);
    }
}
