//! Multi-pattern match enumeration.
//!
//! [`Matches`] is a k-way merge of per-pattern forward search cursors. Each call to `next()`
//! probes every live cursor, yields the probe closest (in characters) to the previously yielded
//! location, and advances only the winning cursor. The other cursors are re-probed on the next
//! call, which keeps the stream in buffer order for any interleaving of the patterns' matches.

use crate::distance::char_distance;
use crate::error::Result;
use crate::host::{BufferId, Host, SearchFlags};
use crate::pattern::Pattern;
use crate::position::{Location, Span};

#[derive(Debug)]
struct PatternCursor {
    pattern: Pattern,
    at: Location,
    // Only the very first probe may match exactly at the start location.
    accept_at_cursor: bool,
    exhausted: bool,
}

/// Lazy, finite, non-restartable stream of matches in buffer order.
///
/// Created by [`Occurrence::matches`](crate::Occurrence::matches).
pub struct Matches<'h, H: Host + ?Sized> {
    host: &'h H,
    buffer: BufferId,
    bounds: Option<Span>,
    remaining: Option<usize>,
    cursors: Vec<PatternCursor>,
    last: Location,
    done: bool,
}

impl<'h, H: Host + ?Sized> Matches<'h, H> {
    pub(crate) fn new(
        host: &'h H,
        buffer: BufferId,
        patterns: &[Pattern],
        bounds: Option<Span>,
        limit: Option<usize>,
    ) -> Self {
        let origin = bounds.map(|b| b.start()).unwrap_or(Location::ZERO);
        let cursors = patterns
            .iter()
            .map(|pattern| PatternCursor {
                pattern: pattern.clone(),
                at: origin,
                accept_at_cursor: true,
                exhausted: false,
            })
            .collect();
        Self {
            host,
            buffer,
            bounds,
            remaining: limit,
            cursors,
            last: origin,
            done: false,
        }
    }

    /// Next in-bounds match of one pattern, without advancing its cursor past it.
    fn probe(&mut self, idx: usize) -> Result<Option<Span>> {
        let cursor = &mut self.cursors[idx];
        loop {
            if cursor.exhausted {
                return Ok(None);
            }

            let flags = SearchFlags::forward(cursor.accept_at_cursor);
            let Some(found) = self
                .host
                .search(self.buffer, &cursor.pattern, cursor.at, flags)?
            else {
                cursor.exhausted = true;
                return Ok(None);
            };

            let Some(bounds) = self.bounds else {
                return Ok(Some(found));
            };
            if found.start() >= bounds.stop() {
                cursor.exhausted = true;
                return Ok(None);
            }
            if bounds.contains_span(&found) {
                return Ok(Some(found));
            }

            log::trace!("discarding out-of-bounds match {found} of {}", cursor.pattern);
            cursor.at = found.start();
            cursor.accept_at_cursor = false;
        }
    }

    fn advance(&mut self) -> Result<Option<Span>> {
        let mut best: Option<(usize, Span, usize)> = None;
        for idx in 0..self.cursors.len() {
            let Some(found) = self.probe(idx)? else {
                continue;
            };
            let distance = char_distance(self.host, self.buffer, self.last, found.start())?;
            // Strict comparison: on a tie the earlier pattern wins.
            if best.is_none_or(|(_, _, d)| distance < d) {
                best = Some((idx, found, distance));
            }
        }

        let Some((idx, found, _)) = best else {
            return Ok(None);
        };
        let winner = &mut self.cursors[idx];
        winner.at = found.start();
        winner.accept_at_cursor = false;
        self.last = found.start();
        Ok(Some(found))
    }
}

impl<H: Host + ?Sized> Iterator for Matches<'_, H> {
    type Item = Result<Span>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == Some(0) {
            return None;
        }

        match self.advance() {
            Ok(Some(found)) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(Ok(found))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
