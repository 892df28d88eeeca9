//! Nearest-match cursor search.

use crate::distance::{buffer_end, char_distance, wrapped_distance};
use crate::error::{OccurrenceError, Result};
use crate::host::{BufferId, Host, SearchFlags, WindowId};
use crate::occurrence::Occurrence;
use crate::position::{Location, Span};

/// Search direction relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the end of the buffer.
    Forward,
    /// Towards the start of the buffer.
    Backward,
}

/// Parameters of [`Occurrence::match_cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSearch {
    /// `None` picks the nearer of the forward and backward candidates.
    pub direction: Option<Direction>,
    /// Skip matches that are not marked.
    pub marked: bool,
    /// Let searches and distances wrap around the buffer boundary.
    pub wrap: bool,
}

impl Default for CursorSearch {
    fn default() -> Self {
        Self {
            direction: None,
            marked: false,
            wrap: true,
        }
    }
}

impl CursorSearch {
    /// Nearest match in either direction.
    pub fn nearest(wrap: bool) -> Self {
        Self {
            wrap,
            ..Self::default()
        }
    }

    /// Next match strictly after the cursor.
    pub fn forward(wrap: bool) -> Self {
        Self {
            direction: Some(Direction::Forward),
            wrap,
            ..Self::default()
        }
    }

    /// Previous match strictly before the cursor.
    pub fn backward(wrap: bool) -> Self {
        Self {
            direction: Some(Direction::Backward),
            wrap,
            ..Self::default()
        }
    }

    /// Returns the same search restricted to marked matches.
    pub fn marked(self) -> Self {
        Self {
            marked: true,
            ..self
        }
    }
}

impl Occurrence {
    /// Move the cursor of `window` to the nearest match and return it.
    ///
    /// When nothing qualifies the cursor is left where it was and `Ok(None)` is returned.
    pub fn match_cursor<H: Host + ?Sized>(
        &self,
        host: &mut H,
        window: WindowId,
        search: CursorSearch,
    ) -> Result<Option<Span>> {
        self.ensure_live()?;
        if self.patterns().is_empty() {
            return Err(OccurrenceError::NoPatterns);
        }
        let actual = host.window_buffer(window)?;
        if actual != self.buffer() {
            return Err(OccurrenceError::BufferMismatch {
                window,
                expected: self.buffer(),
                actual,
            });
        }

        let cursor = host.cursor(window)?;
        let found = self.locate(&*host, cursor, search)?;
        match found {
            Some(span) => {
                host.set_cursor(window, span.start())?;
                Ok(Some(span))
            }
            None => {
                log::warn!("no match near {cursor} in buffer {}", self.buffer());
                Ok(None)
            }
        }
    }

    fn locate<H: Host + ?Sized>(
        &self,
        host: &H,
        cursor: Location,
        search: CursorSearch,
    ) -> Result<Option<Span>> {
        let (direction, first) = match search.direction {
            Some(direction) => (
                direction,
                self.step(host, cursor, direction, false, search.wrap)?,
            ),
            None => {
                let ahead = self.step(host, cursor, Direction::Forward, true, search.wrap)?;
                let behind = self.step(host, cursor, Direction::Backward, false, search.wrap)?;
                match (ahead.first().copied(), behind.first().copied()) {
                    (Some(a), Some(b)) if a != b => {
                        if self.prefer_behind(host, cursor, a, b, search.wrap)? {
                            (Direction::Backward, behind)
                        } else {
                            (Direction::Forward, ahead)
                        }
                    }
                    (Some(_), _) => (Direction::Forward, ahead),
                    (None, _) => (Direction::Backward, behind),
                }
            }
        };

        let Some(origin) = first.first().map(Span::start) else {
            return Ok(None);
        };
        if !search.marked {
            return Ok(first.first().copied());
        }

        // Every pattern matching at a start is checked before moving past it.
        let mut tied = first;
        loop {
            for span in &tied {
                if self.marks.contains(host, *span)? {
                    return Ok(Some(*span));
                }
            }
            let from = match tied.first() {
                Some(span) => span.start(),
                None => return Ok(None),
            };
            let next = self.step(host, from, direction, false, search.wrap)?;
            if next.first().is_none_or(|span| span.start() == origin) {
                return Ok(None);
            }
            tied = next;
        }
    }

    /// Containment wins; otherwise the smaller endpoint distance; ties go forward.
    fn prefer_behind<H: Host + ?Sized>(
        &self,
        host: &H,
        cursor: Location,
        ahead: Span,
        behind: Span,
        wrap: bool,
    ) -> Result<bool> {
        if ahead.contains(cursor) {
            return Ok(false);
        }
        if behind.contains(cursor) {
            return Ok(true);
        }
        let to_ahead = endpoint_distance(host, self.buffer(), cursor, ahead, wrap)?;
        let to_behind = endpoint_distance(host, self.buffer(), cursor, behind, wrap)?;
        Ok(to_behind < to_ahead)
    }

    /// One search step across all patterns: the candidates at the smallest gap in `direction`.
    ///
    /// Candidates sharing that start come in pattern order, so the first one is the winner.
    fn step<H: Host + ?Sized>(
        &self,
        host: &H,
        from: Location,
        direction: Direction,
        accept_at_cursor: bool,
        wrap: bool,
    ) -> Result<Vec<Span>> {
        let flags = match direction {
            Direction::Forward => SearchFlags::forward(accept_at_cursor),
            Direction::Backward => SearchFlags::backward(accept_at_cursor),
        }
        .wrapping(wrap);

        let mut best: Option<usize> = None;
        let mut tied = Vec::new();
        for pattern in self.patterns() {
            let Some(found) = host.search(self.buffer(), pattern, from, flags)? else {
                continue;
            };
            let gap = directional_gap(
                host,
                self.buffer(),
                from,
                found.start(),
                direction,
                accept_at_cursor,
            )?;
            match best {
                Some(g) if gap > g => {}
                Some(g) if gap == g => tied.push(found),
                _ => {
                    best = Some(gap);
                    tied.clear();
                    tied.push(found);
                }
            }
        }
        Ok(tied)
    }
}

fn endpoint_distance<H: Host + ?Sized>(
    host: &H,
    buffer: BufferId,
    cursor: Location,
    span: Span,
    wrap: bool,
) -> Result<usize> {
    let to_start = wrapped_distance(host, buffer, cursor, span.start(), wrap)?;
    let to_stop = wrapped_distance(host, buffer, cursor, span.stop(), wrap)?;
    Ok(to_start.min(to_stop))
}

/// Characters travelled from `from` to `to` moving only in `direction`, wrapping if needed.
fn directional_gap<H: Host + ?Sized>(
    host: &H,
    buffer: BufferId,
    from: Location,
    to: Location,
    direction: Direction,
    inclusive: bool,
) -> Result<usize> {
    let direct = match direction {
        Direction::Forward => to > from || (inclusive && to == from),
        Direction::Backward => to < from || (inclusive && to == from),
    };
    if direct {
        return char_distance(host, buffer, from, to);
    }

    let end = buffer_end(host, buffer)?;
    match direction {
        Direction::Forward => Ok(char_distance(host, buffer, from, end)?
            + char_distance(host, buffer, Location::ZERO, to)?),
        Direction::Backward => Ok(char_distance(host, buffer, Location::ZERO, from)?
            + char_distance(host, buffer, to, end)?),
    }
}
