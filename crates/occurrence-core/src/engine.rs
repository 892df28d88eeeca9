//! The operator engine.
//!
//! One run walks through these phases:
//!
//! ```text
//! Idle -> Collecting -> Before? -> Applying -> After? -> Committing -> Idle
//!                          |           |
//!                          +---------> Cancelled -> Committing
//! ```
//!
//! Collection snapshots the marks inside the motion. Replay operators are applied item by item
//! in reverse collection order. Transform operators are evaluated in collection order with up to
//! `batch_size` results outstanding; their edits are queued and applied afterwards in reverse
//! order, so no edit ever shifts a span that is still waiting.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::StreamExt;
use futures_util::future::LocalBoxFuture;
use futures_util::stream::FuturesUnordered;

use crate::config::EngineConfig;
use crate::distance::buffer_end;
use crate::error::{OccurrenceError, Result};
use crate::host::{AnchorId, BufferId, Host, ReplayFlags, WindowId};
use crate::occurrence::Occurrence;
use crate::operator::{
    Action, Motion, Operator, OperatorContext, OperatorItem, OperatorMode, RunOptions, Step,
    TransformFn, TransformOutput,
};
use crate::position::{Location, Span, SpanKind};
use crate::register::Register;
use crate::undo::{UndoBridge, UndoRecord};

/// What one operator run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorOutcome {
    /// Marks collected inside the motion.
    pub collected: usize,
    /// Items whose edit reached the buffer.
    pub applied: usize,
    /// Marks removed by the run.
    pub unmarked: usize,
    /// The before hook vetoed the run.
    pub vetoed: bool,
    /// A transform cancelled the run.
    pub cancelled: bool,
    /// A register was written.
    pub register_written: bool,
    /// An undo record was pushed.
    pub undo_recorded: bool,
    /// The occurrence ran out of marks and was disposed.
    pub disposed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Collecting,
    Before,
    Applying,
    After,
    Committing,
    Cancelled,
}

/// How one transform item settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Unchanged,
    Handled,
    Edit,
}

type InFlight = LocalBoxFuture<'static, (usize, Option<TransformOutput>)>;

pub(crate) struct Engine<'r, H: Host + ?Sized> {
    host: &'r mut H,
    occurrence: &'r mut Occurrence,
    undo: &'r mut UndoBridge,
    config: &'r EngineConfig,
    window: WindowId,
    phase: Phase,
    outcome: OperatorOutcome,
    // Registration keys of every mark this run removed.
    removed: Vec<String>,
    applied: Vec<(AnchorId, Span)>,
    // Indexed by item index.
    widenings: Vec<Widening>,
}

impl<'r, H: Host + ?Sized> Engine<'r, H> {
    pub(crate) fn new(
        host: &'r mut H,
        occurrence: &'r mut Occurrence,
        undo: &'r mut UndoBridge,
        config: &'r EngineConfig,
        window: WindowId,
    ) -> Self {
        Self {
            host,
            occurrence,
            undo,
            config,
            window,
            phase: Phase::Idle,
            outcome: OperatorOutcome::default(),
            removed: Vec::new(),
            applied: Vec::new(),
            widenings: Vec::new(),
        }
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("operator: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn buffer(&self) -> BufferId {
        self.occurrence.buffer()
    }

    pub(crate) async fn run(
        mut self,
        operator: &Operator,
        options: &RunOptions,
    ) -> Result<OperatorOutcome> {
        self.occurrence.ensure_live()?;
        let operator = operator.flatten();
        let inner = options.inner.unwrap_or(self.config.inner);
        let repeat_handler = self.host.repeat_handler();
        let seq_before = self.host.undo_seq(self.buffer())?;

        self.enter(Phase::Collecting);
        let Some(motion) = self.resolve_motion(&options.motion)? else {
            log::warn!("operator: motion did not resolve to a range");
            self.enter(Phase::Idle);
            return Ok(self.outcome);
        };
        let items = self.collect(motion, options.mode, inner)?;
        self.outcome.collected = items.len();

        let register = operator.uses_register.then(|| {
            let name = options
                .register
                .clone()
                .unwrap_or_else(|| self.config.default_register.clone());
            let kind = items.first().map_or(SpanKind::Char, |item| item.span.kind());
            Register::new(name, kind)
        });
        let context = OperatorContext {
            buffer: self.buffer(),
            window: self.window,
            mode: options.mode,
            register: register.as_ref().map(|r| r.name().to_string()),
            marks: items.iter().map(|item| (item.id, item.span)).collect(),
            patterns: self.occurrence.patterns().to_vec(),
        };
        let mut register = register;

        if let Some(before) = operator.before.as_ref() {
            self.enter(Phase::Before);
            if before(&items, &context).resolve().await.is_none() {
                log::debug!("operator: vetoed by before hook");
                self.outcome.vetoed = true;
                self.enter(Phase::Cancelled);
                return self.commit(register, &context, seq_before, repeat_handler);
            }
        }

        self.enter(Phase::Applying);
        match &operator.action {
            Action::Replay(keys) => {
                self.replay(keys, &items, register.as_mut())?;
            }
            Action::Transform(transform) => {
                let batch_size = self.config.effective_batch_size(operator.batch_size);
                self.transform(
                    Rc::clone(transform),
                    &items,
                    &context,
                    batch_size,
                    register.as_mut(),
                )
                .await?;
            }
        }

        if let Some(after) = operator.after.as_ref() {
            self.enter(Phase::After);
            after(&self.applied, &context);
        }
        if self.outcome.cancelled {
            self.enter(Phase::Cancelled);
        }

        self.commit(register, &context, seq_before, repeat_handler)
    }

    fn commit(
        mut self,
        register: Option<Register>,
        context: &OperatorContext,
        seq_before: u64,
        repeat_handler: Option<String>,
    ) -> Result<OperatorOutcome> {
        self.enter(Phase::Committing);
        let buffer = self.buffer();
        let patterns = &context.patterns;

        if let Some(mut register) = register
            && !self.outcome.cancelled
            && !self.outcome.vetoed
        {
            self.outcome.register_written = register.commit(self.host)?;
        }

        let seq = self.host.undo_seq(buffer)?;
        if seq != seq_before && !self.removed.is_empty() {
            let record = UndoRecord {
                seq,
                patterns: patterns.to_vec(),
                spans: std::mem::take(&mut self.removed),
            };
            if self.undo.push(buffer, record) {
                self.host.attach_change_listener(buffer)?;
            }
            self.outcome.undo_recorded = true;
        }

        if !self.occurrence.has_marks() {
            self.occurrence.dispose(self.host)?;
            self.outcome.disposed = true;
        }

        if self.host.repeat_handler() != repeat_handler {
            log::debug!("operator: restoring repeat handler");
            self.host.set_repeat_handler(repeat_handler);
        }

        log::debug!(
            "operator: {} collected, {} applied, {} unmarked",
            context.marks.len(),
            self.outcome.applied,
            self.outcome.unmarked
        );
        self.enter(Phase::Idle);
        Ok(self.outcome)
    }

    fn resolve_motion(&self, motion: &Motion) -> Result<Option<Span>> {
        let buffer = self.buffer();
        match motion {
            Motion::Span(span) => Ok(Some(*span)),
            Motion::Selection => self.host.selection(self.window),
            Motion::Buffer => Ok(Some(Span::new(
                Location::ZERO,
                buffer_end(&*self.host, buffer)?,
            )?)),
            Motion::Lines(count) => {
                let cursor = self.host.cursor(self.window)?;
                let start = Location::new(cursor.line, 0);
                let last = cursor.line + (*count).max(1);
                let stop = if last < self.host.line_count(buffer)? {
                    Location::new(last, 0)
                } else {
                    buffer_end(&*self.host, buffer)?
                };
                Ok(Some(Span::with_kind(start, stop, SpanKind::Line)?))
            }
            Motion::FromCursor(resolve) => Ok(resolve(self.host.cursor(self.window)?)),
        }
    }

    fn collect(
        &mut self,
        motion: Span,
        mode: OperatorMode,
        inner: bool,
    ) -> Result<Vec<OperatorItem>> {
        let mut marks: Vec<(AnchorId, Span)> = self
            .occurrence
            .marks(&*self.host, Some(motion))?
            .collect::<Result<_>>()?;

        if mode == OperatorMode::Pending {
            let count = self.host.count();
            if count > 0 && marks.len() > count {
                marks.truncate(count);
            }
        }

        let buffer = self.buffer();
        let mut items = Vec::with_capacity(marks.len());
        // Whitespace already taken by the previous item is not taken again.
        let mut floor = Location::ZERO;
        for (index, (id, mark)) in marks.into_iter().enumerate() {
            let widening = if inner {
                Widening::default()
            } else {
                expand_around(&*self.host, buffer, mark, floor)?
            };
            let span = widening.apply(mark)?;
            floor = floor.max(span.stop());
            let text = self.host.text(buffer, span)?;
            self.widenings.push(widening);
            items.push(OperatorItem {
                index,
                id,
                span,
                text,
            });
        }
        Ok(items)
    }

    /// Current span of an item's mark, widened by what it took at collection.
    fn live_span(&self, item: &OperatorItem) -> Result<Span> {
        let current = self.occurrence.marks.get(&*self.host, item.id)?;
        let current = current.ok_or(OccurrenceError::MissingAnchor(item.id))?;
        let widening = self.widenings.get(item.index).copied().unwrap_or_default();
        widening.apply(current)
    }

    fn unmark(&mut self, id: AnchorId) -> Result<()> {
        if let Some(original) = self.occurrence.unmark_id(self.host, id)? {
            self.removed.push(original.key());
            self.outcome.unmarked += 1;
        }
        Ok(())
    }

    fn replay(
        &mut self,
        keys: &str,
        items: &[OperatorItem],
        mut register: Option<&mut Register>,
    ) -> Result<()> {
        let buffer = self.buffer();
        for (n, item) in items.iter().rev().enumerate() {
            let span = self.live_span(item)?;
            if let Some(register) = register.as_deref_mut() {
                register.push(item.index, self.host.text(buffer, span)?.join("\n"));
            }
            // Replay may move anchors, so the mark goes first.
            self.unmark(item.id)?;

            let seq = self.host.undo_seq(buffer)?;
            self.host.set_selection(self.window, span)?;
            self.host.feed_keys(
                self.window,
                keys,
                ReplayFlags {
                    remap: false,
                    join_undo: n > 0,
                },
            )?;
            if self.host.undo_seq(buffer)? != seq {
                self.outcome.applied += 1;
                self.applied.push((item.id, span));
            }
        }
        Ok(())
    }

    async fn transform(
        &mut self,
        transform: Rc<TransformFn>,
        items: &[OperatorItem],
        context: &OperatorContext,
        batch_size: usize,
        register: Option<&mut Register>,
    ) -> Result<()> {
        let mut settled: BTreeMap<usize, Settled> = BTreeMap::new();
        let mut edits: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        let mut in_flight: FuturesUnordered<InFlight> = FuturesUnordered::new();
        let mut queue = items.iter();

        loop {
            while !self.outcome.cancelled && in_flight.len() < batch_size {
                let Some(item) = queue.next() else {
                    break;
                };
                let index = item.index;
                match transform(item, context) {
                    Step::Done(output) => {
                        self.settle(item, Some(output), &mut settled, &mut edits)?;
                    }
                    Step::Cancelled => {
                        self.settle(item, None, &mut settled, &mut edits)?;
                    }
                    pending => {
                        in_flight.push(
                            async move { (index, pending.resolve().await) }.boxed_local(),
                        );
                    }
                }
            }

            let Some((index, output)) = in_flight.next().await else {
                break;
            };
            self.settle(&items[index], output, &mut settled, &mut edits)?;
        }

        if self.outcome.cancelled {
            log::debug!(
                "operator: cancelled, dropping {} queued edits; handled items stay unmarked",
                edits.len()
            );
            return Ok(());
        }

        let buffer = self.buffer();
        for (n, (index, lines)) in edits.into_iter().rev().enumerate() {
            let item = &items[index];
            let span = self.live_span(item)?;
            self.host.replace(buffer, span, &lines, n > 0)?;
            self.unmark(item.id)?;
            self.outcome.applied += 1;
            self.applied.push((item.id, span));
        }

        if let Some(register) = register {
            // The register starts at the first item that did something and takes every item
            // from there on.
            let first = settled
                .iter()
                .find(|(_, s)| **s != Settled::Unchanged)
                .map(|(index, _)| *index);
            if let Some(first) = first {
                register.clear();
                for index in settled.range(first..).map(|(index, _)| *index) {
                    register.push(index, items[index].joined());
                }
            }
        }
        Ok(())
    }

    fn settle(
        &mut self,
        item: &OperatorItem,
        output: Option<TransformOutput>,
        settled: &mut BTreeMap<usize, Settled>,
        edits: &mut BTreeMap<usize, Vec<String>>,
    ) -> Result<()> {
        if self.outcome.cancelled {
            log::debug!("operator: ignoring late result for item {}", item.index);
            return Ok(());
        }
        let Some(output) = output else {
            log::debug!("operator: item {} cancelled the run", item.index);
            self.outcome.cancelled = true;
            edits.clear();
            return Ok(());
        };

        let kind = if output.activates_register() {
            Settled::Handled
        } else {
            Settled::Unchanged
        };
        match output {
            TransformOutput::Unchanged | TransformOutput::Handled => {
                self.unmark(item.id)?;
                settled.insert(item.index, kind);
            }
            TransformOutput::Text(text) => {
                edits.insert(item.index, text.split('\n').map(str::to_string).collect());
                settled.insert(item.index, Settled::Edit);
            }
            TransformOutput::Lines(lines) => {
                if lines.is_empty() {
                    return Err(OccurrenceError::InvalidTransformResult {
                        index: item.index,
                        reason: "replacement has no lines",
                    });
                }
                edits.insert(item.index, lines);
                settled.insert(item.index, Settled::Edit);
            }
        }
        Ok(())
    }
}

/// Whitespace an "around" item took on each side of its mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Widening {
    before: usize,
    after: usize,
}

impl Widening {
    fn apply(self, span: Span) -> Result<Span> {
        if self == Self::default() {
            return Ok(span);
        }
        Span::with_kind(
            span.start().left(self.before),
            span.stop().right(self.after),
            span.kind(),
        )
    }
}

/// Whitespace right after a characterwise span, or else right before it but not before `floor`.
pub(crate) fn expand_around<H: Host + ?Sized>(
    host: &H,
    buffer: BufferId,
    span: Span,
    floor: Location,
) -> Result<Widening> {
    if span.kind() != SpanKind::Char || span.is_empty() {
        return Ok(Widening::default());
    }

    let stop_line: Vec<char> = host.line(buffer, span.stop().line)?.chars().collect();
    let after = stop_line
        .iter()
        .skip(span.stop().column)
        .take_while(|c| c.is_whitespace())
        .count();
    if after > 0 {
        return Ok(Widening { before: 0, after });
    }

    let line = span.start().line;
    let start_line: Vec<char> = host.line(buffer, line)?.chars().collect();
    let column = span.start().column.min(start_line.len());
    let lowest = match floor.line.cmp(&line) {
        Ordering::Less => 0,
        Ordering::Equal => floor.column.min(column),
        Ordering::Greater => column,
    };
    let before = start_line[lowest..column]
        .iter()
        .rev()
        .take_while(|c| c.is_whitespace())
        .count();
    Ok(Widening { before, after: 0 })
}
