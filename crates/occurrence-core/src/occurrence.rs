//! Per-buffer occurrence tracking.
//!
//! An [`Occurrence`] owns an ordered list of [`Pattern`]s and two anchor registries:
//!
//! - **match anchors**: every discovered match of any pattern
//! - **mark anchors**: the user-selected subset the operator engine works on
//!
//! Marking a span always registers it as a match too, and a mark reuses the id of its match
//! anchor, so an id present in the marks is always present in the matches.

use crate::anchors::{AnchorIter, AnchorRef, AnchorSet};
use crate::error::{OccurrenceError, Result};
use crate::host::{AnchorId, BufferId, Host};
use crate::matches::Matches;
use crate::pattern::{Pattern, PatternKind};
use crate::position::Span;

/// Tracks the patterns, matches, and marks of one buffer.
#[derive(Debug)]
pub struct Occurrence {
    buffer: BufferId,
    patterns: Vec<Pattern>,
    pub(crate) matches: AnchorSet,
    pub(crate) marks: AnchorSet,
    disposed: bool,
}

impl Occurrence {
    /// Create an empty occurrence for `buffer`.
    pub fn new<H: Host + ?Sized>(host: &mut H, buffer: BufferId) -> Self {
        Self {
            buffer,
            patterns: Vec::new(),
            matches: AnchorSet::new(host, buffer, "occurrence-matches"),
            marks: AnchorSet::new(host, buffer, "occurrence-marks"),
            disposed: false,
        }
    }

    /// The buffer this occurrence belongs to.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Returns `true` once [`Occurrence::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(OccurrenceError::Disposed(self.buffer));
        }
        Ok(())
    }

    /// Patterns in insertion order.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Normalize `text` into a pattern and add it.
    ///
    /// See [`Occurrence::add`].
    pub fn add_pattern<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        text: &str,
        kind: PatternKind,
    ) -> Result<Pattern> {
        self.ensure_live()?;
        self.add(host, Pattern::new(text, kind)?)
    }

    /// Add an already-normalized pattern.
    ///
    /// An equal pattern is returned unchanged. A new pattern is appended and every match of that
    /// pattern alone is registered as a match anchor.
    pub fn add<H: Host + ?Sized>(&mut self, host: &mut H, pattern: Pattern) -> Result<Pattern> {
        self.ensure_live()?;
        if let Some(existing) = self.patterns.iter().find(|p| **p == pattern) {
            return Ok(existing.clone());
        }

        self.patterns.push(pattern.clone());
        let found: Vec<Span> = Matches::new(
            &*host,
            self.buffer,
            std::slice::from_ref(&pattern),
            None,
            None,
        )
        .collect::<Result<_>>()?;
        for span in &found {
            self.matches.add(host, *span)?;
        }
        log::debug!(
            "buffer {}: added pattern {} ({} matches)",
            self.buffer,
            pattern,
            found.len()
        );
        Ok(pattern)
    }

    /// Forget all patterns, matches, and marks. The occurrence stays usable.
    pub fn clear_patterns<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        self.ensure_live()?;
        self.patterns.clear();
        self.marks.clear(host)?;
        self.matches.clear(host)?;
        Ok(())
    }

    /// Returns `true` if any pattern matches, optionally inside `bounds`.
    ///
    /// Stops at the first hit.
    pub fn has_matches<H: Host + ?Sized>(&self, host: &H, bounds: Option<Span>) -> Result<bool> {
        self.ensure_live()?;
        for pattern in &self.patterns {
            let mut first = Matches::new(
                host,
                self.buffer,
                std::slice::from_ref(pattern),
                bounds,
                Some(1),
            );
            if first.next().transpose()?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lazily enumerate matches of every pattern (or of `patterns`) in buffer order.
    ///
    /// Fails with [`OccurrenceError::NoPatterns`] if there is nothing to search for.
    pub fn matches<'h, H: Host + ?Sized>(
        &self,
        host: &'h H,
        bounds: Option<Span>,
        limit: Option<usize>,
        patterns: Option<&[Pattern]>,
    ) -> Result<Matches<'h, H>> {
        self.ensure_live()?;
        let patterns = patterns.unwrap_or(&self.patterns);
        if patterns.is_empty() {
            return Err(OccurrenceError::NoPatterns);
        }
        Ok(Matches::new(host, self.buffer, patterns, bounds, limit))
    }

    /// Register anchors for every current match of every pattern.
    ///
    /// Returns the number of newly registered matches.
    pub fn refresh_matches<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<usize> {
        let found: Vec<Span> = self.matches(&*host, None, None, None)?.collect::<Result<_>>()?;
        let mut added = 0;
        for span in found {
            if self.matches.add(host, span)?.1 {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Lazily enumerate marks in buffer order.
    pub fn marks<'h, H: Host + ?Sized>(
        &self,
        host: &'h H,
        bounds: Option<Span>,
    ) -> Result<AnchorIter<'h, H>> {
        self.ensure_live()?;
        self.marks.iter(host, bounds)
    }

    /// Number of marks.
    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    /// Returns `true` if at least one span is marked.
    pub fn has_marks(&self) -> bool {
        !self.marks.is_empty()
    }

    /// Returns `true` if `span` (or the anchor currently at it) is marked.
    pub fn is_marked<H: Host + ?Sized>(&self, host: &H, span: impl Into<AnchorRef>) -> Result<bool> {
        self.ensure_live()?;
        self.marks.contains(host, span)
    }

    /// Mark `span`, registering it as a match too. Returns whether a new mark was added.
    pub fn mark<H: Host + ?Sized>(&mut self, host: &mut H, span: Span) -> Result<bool> {
        self.ensure_live()?;
        let (id, _) = self.matches.add(host, span)?;
        self.marks.add_as(host, id, span)
    }

    /// Unmark `span`. The match anchor stays. Returns whether something was removed.
    pub fn unmark<H: Host + ?Sized>(&mut self, host: &mut H, span: Span) -> Result<bool> {
        self.ensure_live()?;
        self.marks.remove(host, span)
    }

    /// Unmark by id, returning the span the mark was registered with.
    pub(crate) fn unmark_id<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        id: AnchorId,
    ) -> Result<Option<Span>> {
        let original = self.marks.original(id);
        let removed = self.marks.remove(host, id)?;
        Ok(original.filter(|_| removed))
    }

    /// Flip the mark state of `span`. Returns `true` if it is marked afterwards.
    pub fn toggle_mark<H: Host + ?Sized>(&mut self, host: &mut H, span: Span) -> Result<bool> {
        if self.is_marked(&*host, span)? {
            self.unmark(host, span)?;
            Ok(false)
        } else {
            self.mark(host, span)?;
            Ok(true)
        }
    }

    /// Mark every match inside `bounds`. Returns the number of new marks.
    pub fn mark_all<H: Host + ?Sized>(&mut self, host: &mut H, bounds: Option<Span>) -> Result<usize> {
        let found: Vec<Span> = self.matches(&*host, bounds, None, None)?.collect::<Result<_>>()?;
        let mut added = 0;
        for span in found {
            if self.mark(host, span)? {
                added += 1;
            }
        }
        log::debug!("buffer {}: marked {added} matches", self.buffer);
        Ok(added)
    }

    /// Unmark every mark inside `bounds`. Returns the number of removed marks.
    pub fn unmark_all<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        bounds: Option<Span>,
    ) -> Result<usize> {
        let ids: Vec<AnchorId> = self
            .marks(&*host, bounds)?
            .map(|entry| entry.map(|(id, _)| id))
            .collect::<Result<_>>()?;
        let mut removed = 0;
        for id in ids {
            if self.marks.remove(host, id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove a match anchor together with its mark.
    pub fn remove_match<H: Host + ?Sized>(&mut self, host: &mut H, span: Span) -> Result<bool> {
        self.ensure_live()?;
        let Some(id) = self.matches.resolve(&*host, AnchorRef::Span(span))? else {
            return Ok(false);
        };
        self.marks.remove(host, id)?;
        self.matches.remove(host, id)
    }

    /// Release every anchor and make the occurrence unusable.
    pub fn dispose<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        self.ensure_live()?;
        self.marks.clear(host)?;
        self.matches.clear(host)?;
        self.patterns.clear();
        self.disposed = true;
        log::debug!("buffer {}: occurrence disposed", self.buffer);
        Ok(())
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

    fn setup(text: &str) -> (MemoryHost, Occurrence) {
        let mut host = MemoryHost::new();
        let buffer = host.add_buffer(text);
        let occurrence = Occurrence::new(&mut host, buffer);
        (host, occurrence)
    }

    fn marked(host: &MemoryHost, occurrence: &Occurrence) -> Vec<Span> {
        occurrence
            .marks(host, None)
            .unwrap()
            .map(|entry| entry.unwrap().1)
            .collect()
    }

    #[test]
    fn test_add_pattern_registers_matches_once() {
        let (mut host, mut occurrence) = setup("foo bar\nbaz foo");
        let first = occurrence
            .add_pattern(&mut host, "foo", PatternKind::Word)
            .unwrap();
        let again = occurrence
            .add_pattern(&mut host, "foo", PatternKind::Word)
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(occurrence.patterns().len(), 1);
        assert_eq!(occurrence.matches.len(), 2);
        assert!(occurrence.has_matches(&host, None).unwrap());
        assert!(
            !occurrence
                .has_matches(&host, Some(span(0, 3, 1, 3)))
                .unwrap()
        );
    }

    #[test]
    fn test_matches_without_patterns_fail() {
        let (host, occurrence) = setup("foo");
        assert!(matches!(
            occurrence.matches(&host, None, None, None),
            Err(OccurrenceError::NoPatterns)
        ));
        assert!(!occurrence.has_matches(&host, None).unwrap());
    }

    #[test]
    fn test_mark_is_idempotent_and_implies_match() {
        let (mut host, mut occurrence) = setup("foo bar foo");
        assert!(occurrence.mark(&mut host, span(0, 4, 0, 7)).unwrap());
        assert!(!occurrence.mark(&mut host, span(0, 4, 0, 7)).unwrap());

        assert_eq!(occurrence.mark_count(), 1);
        assert!(occurrence.matches.contains(&host, span(0, 4, 0, 7)).unwrap());
        assert!(occurrence.is_marked(&host, span(0, 4, 0, 7)).unwrap());
    }

    #[test]
    fn test_toggle_and_unmark_keep_the_match() {
        let (mut host, mut occurrence) = setup("foo bar foo");
        occurrence
            .add_pattern(&mut host, "foo", PatternKind::Word)
            .unwrap();

        assert!(occurrence.toggle_mark(&mut host, span(0, 0, 0, 3)).unwrap());
        assert!(!occurrence.toggle_mark(&mut host, span(0, 0, 0, 3)).unwrap());
        assert!(!occurrence.has_marks());
        assert_eq!(occurrence.matches.len(), 2);

        occurrence.mark(&mut host, span(0, 0, 0, 3)).unwrap();
        assert!(occurrence.remove_match(&mut host, span(0, 0, 0, 3)).unwrap());
        assert!(!occurrence.has_marks());
        assert_eq!(occurrence.matches.len(), 1);
    }

    #[test]
    fn test_mark_all_and_unmark_all_respect_bounds() {
        let (mut host, mut occurrence) = setup("foo foo\nfoo foo");
        occurrence
            .add_pattern(&mut host, "foo", PatternKind::Word)
            .unwrap();

        assert_eq!(
            occurrence
                .mark_all(&mut host, Some(span(1, 0, 1, 7)))
                .unwrap(),
            2
        );
        assert_eq!(occurrence.mark_all(&mut host, None).unwrap(), 2);
        assert_eq!(marked(&host, &occurrence).len(), 4);

        assert_eq!(
            occurrence
                .unmark_all(&mut host, Some(span(0, 0, 0, 7)))
                .unwrap(),
            2
        );
        assert_eq!(
            marked(&host, &occurrence),
            vec![span(1, 0, 1, 3), span(1, 4, 1, 7)]
        );
    }

    #[test]
    fn test_refresh_picks_up_new_text() {
        let (mut host, mut occurrence) = setup("foo");
        occurrence
            .add_pattern(&mut host, "foo", PatternKind::Word)
            .unwrap();
        let buffer = occurrence.buffer();
        host.replace(buffer, span(0, 3, 0, 3), &[" foo".to_string()], false)
            .unwrap();

        assert_eq!(occurrence.refresh_matches(&mut host).unwrap(), 1);
        assert_eq!(occurrence.refresh_matches(&mut host).unwrap(), 0);
    }

    #[test]
    fn test_disposed_occurrence_fails_fast() {
        let (mut host, mut occurrence) = setup("foo");
        occurrence.mark(&mut host, span(0, 0, 0, 3)).unwrap();
        occurrence.dispose(&mut host).unwrap();

        assert!(occurrence.is_disposed());
        assert!(matches!(
            occurrence.mark(&mut host, span(0, 0, 0, 3)),
            Err(OccurrenceError::Disposed(_))
        ));
        assert!(matches!(
            occurrence.dispose(&mut host),
            Err(OccurrenceError::Disposed(_))
        ));
        let ns = occurrence.marks.namespace();
        assert!(
            host.anchors_in(occurrence.buffer(), ns, None)
                .unwrap()
                .is_empty()
        );
    }
}
