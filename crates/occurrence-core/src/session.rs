//! The session: every piece of per-buffer and per-window state in one place.
//!
//! A [`Session`] owns one [`Occurrence`] per buffer, the undo bridge, the dot-repeat cursor
//! cache, and the last operator invocation. Hosts keep one session for their lifetime and pass
//! themselves in on every call.

use std::collections::HashMap;

use futures_executor::block_on;

use crate::config::EngineConfig;
use crate::engine::{Engine, OperatorOutcome};
use crate::error::Result;
use crate::host::{BufferId, Host, WindowId};
use crate::nearest::{CursorSearch, Direction};
use crate::occurrence::Occurrence;
use crate::operator::{Operator, RunOptions};
use crate::pattern::{Pattern, PatternKind};
use crate::position::Span;
use crate::source::PatternSource;
use crate::undo::{RepeatCache, UndoBridge};

#[derive(Debug, Clone)]
struct LastRun {
    operator: Operator,
    options: RunOptions,
}

/// Registry of occurrences, undo records, and repeat state.
#[derive(Debug, Default)]
pub struct Session {
    config: EngineConfig,
    occurrences: HashMap<BufferId, Occurrence>,
    undo: UndoBridge,
    repeat: RepeatCache,
    last: Option<LastRun>,
}

impl Session {
    /// Create a session with `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The live occurrence of `buffer`, if any.
    pub fn get(&self, buffer: BufferId) -> Option<&Occurrence> {
        self.occurrences.get(&buffer).filter(|o| !o.is_disposed())
    }

    /// Mutable access to the live occurrence of `buffer`, if any.
    pub fn get_mut(&mut self, buffer: BufferId) -> Option<&mut Occurrence> {
        self.occurrences
            .get_mut(&buffer)
            .filter(|o| !o.is_disposed())
    }

    /// The occurrence of `buffer`, created on first use.
    pub fn get_or_create<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        buffer: BufferId,
    ) -> &mut Occurrence {
        let occurrence = self
            .occurrences
            .entry(buffer)
            .or_insert_with(|| Occurrence::new(host, buffer));
        if occurrence.is_disposed() {
            *occurrence = Occurrence::new(host, buffer);
        }
        occurrence
    }

    /// Dispose the occurrence of `buffer`. Returns whether there was a live one.
    pub fn dispose<H: Host + ?Sized>(&mut self, host: &mut H, buffer: BufferId) -> Result<bool> {
        match self.occurrences.remove(&buffer) {
            Some(mut occurrence) if !occurrence.is_disposed() => {
                occurrence.dispose(host)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drop everything held for a buffer that is going away.
    pub fn close_buffer<H: Host + ?Sized>(&mut self, host: &mut H, buffer: BufferId) -> Result<()> {
        self.dispose(host, buffer)?;
        if self.undo.forget(buffer) > 0 {
            host.detach_change_listener(buffer)?;
        }
        Ok(())
    }

    /// Add a pattern to the occurrence of `buffer`, creating it if needed.
    pub fn add_pattern<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        buffer: BufferId,
        text: &str,
        kind: PatternKind,
    ) -> Result<Pattern> {
        self.get_or_create(host, buffer)
            .add_pattern(host, text, kind)
    }

    /// Add a pattern read from `source` in `window`.
    ///
    /// Returns `Ok(None)` when the source has nothing to offer.
    pub fn add_pattern_from<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        window: WindowId,
        source: PatternSource,
    ) -> Result<Option<Pattern>> {
        let Some(text) = source.read(&*host, window)? else {
            return Ok(None);
        };
        let buffer = host.window_buffer(window)?;
        self.add_pattern(host, buffer, &text, source.kind())
            .map(Some)
    }

    /// Mark every match inside the window's selection.
    pub fn mark_selection<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        window: WindowId,
    ) -> Result<usize> {
        let buffer = host.window_buffer(window)?;
        let Some(selection) = host.selection(window)? else {
            log::warn!("window {window} has no selection");
            return Ok(0);
        };
        match self.get_mut(buffer) {
            Some(occurrence) => occurrence.mark_all(host, Some(selection)),
            None => Ok(0),
        }
    }

    /// Move the cursor of `window` to the nearest match of its buffer's occurrence.
    pub fn match_cursor<H: Host + ?Sized>(
        &self,
        host: &mut H,
        window: WindowId,
        direction: Option<Direction>,
        marked: bool,
    ) -> Result<Option<Span>> {
        let buffer = host.window_buffer(window)?;
        let Some(occurrence) = self.get(buffer) else {
            log::warn!("buffer {buffer} has no occurrence");
            return Ok(None);
        };
        let search = CursorSearch {
            direction,
            marked,
            wrap: self.config.wrap,
        };
        occurrence.match_cursor(host, window, search)
    }

    /// Apply `operator` to the marks of the buffer shown in `window`.
    ///
    /// A buffer without a live occurrence yields an empty outcome.
    pub async fn run_operator<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        window: WindowId,
        operator: Operator,
        options: RunOptions,
    ) -> Result<OperatorOutcome> {
        if options.repeat
            && let Some(cursor) = self.repeat.take(window)
        {
            host.set_cursor(window, cursor)?;
        }
        let buffer = host.window_buffer(window)?;

        let Some(occurrence) = self
            .occurrences
            .get_mut(&buffer)
            .filter(|o| !o.is_disposed())
        else {
            log::warn!("buffer {buffer} has no occurrence to operate on");
            self.last = Some(LastRun { operator, options });
            return Ok(OperatorOutcome::default());
        };

        let outcome = Engine::new(host, occurrence, &mut self.undo, &self.config, window)
            .run(&operator, &options)
            .await?;
        if outcome.disposed {
            self.occurrences.remove(&buffer);
        }
        self.last = Some(LastRun { operator, options });
        Ok(outcome)
    }

    /// [`Session::run_operator`] driven to completion on the current thread.
    pub fn run_operator_blocking<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        window: WindowId,
        operator: Operator,
        options: RunOptions,
    ) -> Result<OperatorOutcome> {
        block_on(self.run_operator(host, window, operator, options))
    }

    /// Run the previous operator again as a dot-repeat.
    ///
    /// Returns `Ok(None)` if nothing ran yet.
    pub async fn repeat_last<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        window: WindowId,
    ) -> Result<Option<OperatorOutcome>> {
        let Some(last) = self.last.clone() else {
            log::warn!("nothing to repeat");
            return Ok(None);
        };
        let options = RunOptions {
            repeat: true,
            ..last.options
        };
        self.run_operator(host, window, last.operator, options)
            .await
            .map(Some)
    }

    /// [`Session::repeat_last`] driven to completion on the current thread.
    pub fn repeat_last_blocking<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        window: WindowId,
    ) -> Result<Option<OperatorOutcome>> {
        block_on(self.repeat_last(host, window))
    }

    /// Call when the "repeat last change" key is pressed, before the repeat runs.
    pub fn observe_repeat_key<H: Host + ?Sized>(
        &mut self,
        host: &H,
        window: WindowId,
    ) -> Result<()> {
        let cursor = host.cursor(window)?;
        self.repeat.observe(window, cursor);
        Ok(())
    }

    /// Text-change notification for `buffer`.
    ///
    /// Restores the patterns and marks of every operator run that has been undone and returns
    /// the number of marks restored.
    pub fn on_text_changed<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        buffer: BufferId,
    ) -> Result<usize> {
        if !self.undo.is_listening(buffer) {
            return Ok(0);
        }
        let seq = host.undo_seq(buffer)?;
        let undone = self.undo.settle(buffer, seq);

        let mut restored = 0;
        for record in undone {
            let occurrence = self.get_or_create(host, buffer);
            for pattern in &record.patterns {
                occurrence.add(host, pattern.clone())?;
            }
            for span in record.spans() {
                if occurrence.mark(host, span?)? {
                    restored += 1;
                }
            }
            log::debug!(
                "buffer {buffer}: restored {} marks of record {}",
                record.spans.len(),
                record.seq
            );
        }

        if !self.undo.is_listening(buffer) {
            host.detach_change_listener(buffer)?;
        }
        Ok(restored)
    }

    /// Number of pending undo records for `buffer`.
    pub fn undo_depth(&self, buffer: BufferId) -> usize {
        self.undo.depth(buffer)
    }
}
