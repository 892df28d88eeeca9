//! Live Range Registry.
//!
//! An [`AnchorSet`] associates spans with stable [`AnchorId`]s. Positions are never recomputed
//! here: the host's live-tracking primitive keeps every anchor current as the buffer changes, and
//! the registry only remembers which key (the serialized span at registration time) belongs to
//! which id.

use std::collections::HashMap;

use crate::error::{OccurrenceError, Result};
use crate::host::{AnchorId, BufferId, Host, NamespaceId};
use crate::position::Span;

/// Addresses a registry entry either by id or by span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorRef {
    /// By anchor id.
    Id(AnchorId),
    /// By span: the registration key first, then the anchor currently sitting exactly there.
    Span(Span),
}

impl From<AnchorId> for AnchorRef {
    fn from(id: AnchorId) -> Self {
        Self::Id(id)
    }
}

impl From<Span> for AnchorRef {
    fn from(span: Span) -> Self {
        Self::Span(span)
    }
}

impl From<&Span> for AnchorRef {
    fn from(span: &Span) -> Self {
        Self::Span(*span)
    }
}

/// A set of live-tracked spans scoped to one buffer and one host namespace.
#[derive(Debug)]
pub struct AnchorSet {
    buffer: BufferId,
    namespace: NamespaceId,
    ids_by_key: HashMap<String, AnchorId>,
    keys_by_id: HashMap<AnchorId, String>,
}

impl AnchorSet {
    /// Create an empty registry in a fresh host namespace.
    pub fn new<H: Host + ?Sized>(host: &mut H, buffer: BufferId, name: &str) -> Self {
        let namespace = host.create_namespace(name);
        Self {
            buffer,
            namespace,
            ids_by_key: HashMap::new(),
            keys_by_id: HashMap::new(),
        }
    }

    /// The buffer this registry tracks.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// The host namespace backing this registry.
    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.keys_by_id.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.keys_by_id.is_empty()
    }

    /// Register `span`. Returns the id and whether a new entry was created.
    ///
    /// Registering a span that is already present (by key, or by an anchor currently sitting
    /// exactly on it) returns the existing id.
    pub fn add<H: Host + ?Sized>(&mut self, host: &mut H, span: Span) -> Result<(AnchorId, bool)> {
        if let Some(id) = self.resolve(host, AnchorRef::Span(span))? {
            return Ok((id, false));
        }
        let id = host.anchor_set(self.buffer, self.namespace, None, span)?;
        self.insert_key(id, span);
        Ok((id, true))
    }

    /// Register `span` under an id allocated by another registry.
    ///
    /// Used to keep mark ids identical to their match ids.
    pub(crate) fn add_as<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        id: AnchorId,
        span: Span,
    ) -> Result<bool> {
        if self.keys_by_id.contains_key(&id) {
            return Ok(false);
        }
        if let Some(existing) = self.resolve(host, AnchorRef::Span(span))? {
            log::debug!("span {span} already registered as {existing}, not as {id}");
            return Ok(false);
        }
        host.anchor_set(self.buffer, self.namespace, Some(id), span)?;
        self.insert_key(id, span);
        Ok(true)
    }

    fn insert_key(&mut self, id: AnchorId, span: Span) {
        let key = span.key();
        self.ids_by_key.insert(key.clone(), id);
        self.keys_by_id.insert(id, key);
    }

    /// Remove an entry. Removing something that is not registered is a no-op.
    pub fn remove<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        anchor: impl Into<AnchorRef>,
    ) -> Result<bool> {
        let Some(id) = self.resolve(host, anchor.into())? else {
            return Ok(false);
        };
        if let Some(key) = self.keys_by_id.remove(&id) {
            self.ids_by_key.remove(&key);
        }
        host.anchor_delete(self.buffer, self.namespace, id)?;
        Ok(true)
    }

    /// Current span of an entry, or `None` if it is not registered.
    ///
    /// Fails with [`OccurrenceError::MissingAnchor`] if the entry is registered but the host no
    /// longer knows its anchor.
    pub fn get<H: Host + ?Sized>(
        &self,
        host: &H,
        anchor: impl Into<AnchorRef>,
    ) -> Result<Option<Span>> {
        let Some(id) = self.resolve(host, anchor.into())? else {
            return Ok(None);
        };
        self.current(host, id).map(Some)
    }

    fn current<H: Host + ?Sized>(&self, host: &H, id: AnchorId) -> Result<Span> {
        host.anchor_get(self.buffer, self.namespace, id)?
            .ok_or(OccurrenceError::MissingAnchor(id))
    }

    /// Returns `true` if the entry is registered.
    pub fn contains<H: Host + ?Sized>(
        &self,
        host: &H,
        anchor: impl Into<AnchorRef>,
    ) -> Result<bool> {
        Ok(self.resolve(host, anchor.into())?.is_some())
    }

    /// The span an id was registered with.
    pub fn original(&self, id: AnchorId) -> Option<Span> {
        self.keys_by_id
            .get(&id)
            .and_then(|key| Span::from_key(key).ok())
    }

    /// Lazily enumerate `(id, current span)` in buffer order.
    ///
    /// The set of ids is a host snapshot taken now; spans are re-read as the iterator advances,
    /// so the sequence terminates even if the buffer changes in between.
    pub fn iter<'h, H: Host + ?Sized>(
        &self,
        host: &'h H,
        bounds: Option<Span>,
    ) -> Result<AnchorIter<'h, H>> {
        let ids: Vec<AnchorId> = host
            .anchors_in(self.buffer, self.namespace, bounds)?
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| self.keys_by_id.contains_key(id))
            .collect();
        Ok(AnchorIter {
            host,
            buffer: self.buffer,
            namespace: self.namespace,
            ids: ids.into_iter(),
        })
    }

    /// Release every host anchor and forget all entries.
    pub fn clear<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        host.anchor_clear(self.buffer, self.namespace)?;
        self.ids_by_key.clear();
        self.keys_by_id.clear();
        Ok(())
    }

    /// The id an entry is registered under, if any.
    pub(crate) fn resolve<H: Host + ?Sized>(
        &self,
        host: &H,
        anchor: AnchorRef,
    ) -> Result<Option<AnchorId>> {
        match anchor {
            AnchorRef::Id(id) => Ok(self.keys_by_id.contains_key(&id).then_some(id)),
            AnchorRef::Span(span) => {
                if let Some(id) = self.ids_by_key.get(&span.key()) {
                    return Ok(Some(*id));
                }
                // Keys go stale once the buffer is edited; fall back to the live position.
                let live = host
                    .anchors_in(self.buffer, self.namespace, Some(span))?
                    .into_iter()
                    .find(|(id, current)| {
                        current.start() == span.start()
                            && current.stop() == span.stop()
                            && self.keys_by_id.contains_key(id)
                    })
                    .map(|(id, _)| id);
                Ok(live)
            }
        }
    }
}

/// Iterator returned by [`AnchorSet::iter`].
pub struct AnchorIter<'h, H: Host + ?Sized> {
    host: &'h H,
    buffer: BufferId,
    namespace: NamespaceId,
    ids: std::vec::IntoIter<AnchorId>,
}

impl<H: Host + ?Sized> Iterator for AnchorIter<'_, H> {
    type Item = Result<(AnchorId, Span)>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(
            self.host
                .anchor_get(self.buffer, self.namespace, id)
                .and_then(|span| span.ok_or(OccurrenceError::MissingAnchor(id)))
                .map(|span| (id, span)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;
    use crate::position::Location;

    fn span(l0: usize, c0: usize, l1: usize, c1: usize) -> Span {
        Span::new(Location::new(l0, c0), Location::new(l1, c1)).unwrap()
    }

    fn setup(text: &str) -> (MemoryHost, BufferId, AnchorSet) {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer(text);
        let set = AnchorSet::new(&mut host, buffer, "test");
        (host, buffer, set)
    }

    #[test]
    fn test_add_is_idempotent() {
        let (mut host, _, mut set) = setup("foo bar foo");
        let (id, inserted) = set.add(&mut host, span(0, 0, 0, 3)).unwrap();
        assert!(inserted);
        let (again, inserted) = set.add(&mut host, span(0, 0, 0, 3)).unwrap();
        assert!(!inserted);
        assert_eq!(id, again);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_by_id_or_span_and_missing_is_noop() {
        let (mut host, _, mut set) = setup("foo bar foo");
        let (a, _) = set.add(&mut host, span(0, 0, 0, 3)).unwrap();
        set.add(&mut host, span(0, 8, 0, 11)).unwrap();

        assert!(set.remove(&mut host, a).unwrap());
        assert!(!set.remove(&mut host, a).unwrap());
        assert!(set.remove(&mut host, span(0, 8, 0, 11)).unwrap());
        assert!(!set.remove(&mut host, span(0, 4, 0, 7)).unwrap());
        assert!(set.is_empty());
    }

    #[test]
    fn test_get_follows_edits_and_resolves_stale_keys() {
        let (mut host, buffer, mut set) = setup("foo bar foo");
        let (id, _) = set.add(&mut host, span(0, 8, 0, 11)).unwrap();

        host.replace(buffer, span(0, 0, 0, 0), &["xx".to_string()], false)
            .unwrap();

        assert_eq!(set.get(&host, id).unwrap(), Some(span(0, 10, 0, 13)));
        // The registration key still resolves...
        assert_eq!(set.get(&host, span(0, 8, 0, 11)).unwrap(), Some(span(0, 10, 0, 13)));
        // ...and so does the live position.
        assert!(set.contains(&host, span(0, 10, 0, 13)).unwrap());
        assert_eq!(set.original(id), Some(span(0, 8, 0, 11)));
    }

    #[test]
    fn test_get_fails_loudly_when_host_anchor_is_gone() {
        let (mut host, buffer, mut set) = setup("foo");
        let (id, _) = set.add(&mut host, span(0, 0, 0, 3)).unwrap();
        host.anchor_delete(buffer, set.namespace(), id).unwrap();

        assert_eq!(
            set.get(&host, id).unwrap_err(),
            OccurrenceError::MissingAnchor(id)
        );
    }

    #[test]
    fn test_iter_is_ordered_and_bounded() {
        let (mut host, _, mut set) = setup("foo bar\nbaz foo\nfoo");
        set.add(&mut host, span(2, 0, 2, 3)).unwrap();
        set.add(&mut host, span(0, 0, 0, 3)).unwrap();
        set.add(&mut host, span(1, 4, 1, 7)).unwrap();

        let all: Vec<Span> = set
            .iter(&host, None)
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(all, vec![span(0, 0, 0, 3), span(1, 4, 1, 7), span(2, 0, 2, 3)]);

        let bounded: Vec<Span> = set
            .iter(&host, Some(span(1, 0, 2, 0)))
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(bounded, vec![span(1, 4, 1, 7)]);
    }

    #[test]
    fn test_clear_releases_everything() {
        let (mut host, buffer, mut set) = setup("foo foo");
        set.add(&mut host, span(0, 0, 0, 3)).unwrap();
        set.add(&mut host, span(0, 4, 0, 7)).unwrap();
        set.clear(&mut host).unwrap();

        assert!(set.is_empty());
        assert!(host.anchors_in(buffer, set.namespace(), None).unwrap().is_empty());
    }
}
