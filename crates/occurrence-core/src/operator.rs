//! Operator definitions.
//!
//! An [`Operator`] is what the engine applies to every marked span inside a motion. There are
//! two shapes:
//!
//! - [`Operator::ReplaySequence`]: a literal host key sequence, replayed once per mark against a
//!   selection covering that mark
//! - [`Operator::Transform`]: a function from an [`OperatorItem`] to a [`Step`] carrying a
//!   [`TransformOutput`], possibly resolving later
//!
//! [`Operator::Config`] wraps either shape with hooks and a batch size.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;

use crate::host::{AnchorId, BufferId, WindowId};
use crate::pattern::Pattern;
use crate::position::{Location, Span};

/// A possibly-deferred result.
///
/// `Pending` holds a continuation that resolves to another step, so a result may hop through
/// several suspensions before it is `Done` or `Cancelled`.
pub enum Step<T> {
    /// Stop the operation.
    Cancelled,
    /// Not available yet.
    Pending(LocalBoxFuture<'static, Step<T>>),
    /// Available now.
    Done(T),
}

impl<T> Step<T> {
    /// Wrap a future as a pending step.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Step<T>> + 'static,
    {
        Self::Pending(future.boxed_local())
    }

    /// Wrap a future producing a plain value.
    pub fn later<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        Self::Pending(future.map(Step::Done).boxed_local())
    }

    /// Wait until the step is settled. `None` means cancelled.
    pub async fn resolve(self) -> Option<T> {
        let mut step = self;
        loop {
            match step {
                Self::Cancelled => return None,
                Self::Done(value) => return Some(value),
                Self::Pending(future) => step = future.await,
            }
        }
    }

    /// Returns `true` if the value (or cancellation) is already known.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

impl<T: fmt::Debug> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Done(value) => f.debug_tuple("Done").field(value).finish(),
        }
    }
}

/// What a transform did with one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutput {
    /// Nothing to do for this item; it is unmarked.
    Unchanged,
    /// The transform took care of the item itself; it is unmarked.
    Handled,
    /// Replace the item with this text. `'\n'` separates lines.
    Text(String),
    /// Replace the item with these lines. Must not be empty.
    Lines(Vec<String>),
}

impl TransformOutput {
    /// Returns `true` for results that count as "handled" for register activation.
    pub(crate) fn activates_register(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl From<String> for TransformOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for TransformOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for TransformOutput {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

impl From<TransformOutput> for Step<TransformOutput> {
    fn from(output: TransformOutput) -> Self {
        Self::Done(output)
    }
}

/// `true` means handled, `false` cancels the whole run.
impl From<bool> for Step<TransformOutput> {
    fn from(handled: bool) -> Self {
        if handled {
            Self::Done(TransformOutput::Handled)
        } else {
            Self::Cancelled
        }
    }
}

/// Transform function.
pub type TransformFn = dyn Fn(&OperatorItem, &OperatorContext) -> Step<TransformOutput>;
/// Before hook. Returning [`Step::Cancelled`] vetoes the run.
pub type BeforeHook = dyn Fn(&[OperatorItem], &OperatorContext) -> Step<()>;
/// After hook, called with the `(id, span)` of every applied edit.
pub type AfterHook = dyn Fn(&[(AnchorId, Span)], &OperatorContext);

/// The operation applied to every marked span.
#[derive(Clone)]
pub enum Operator {
    /// Replay a host key sequence over each mark.
    ReplaySequence(String),
    /// Compute a replacement for each mark.
    Transform(Rc<TransformFn>),
    /// An operator with hooks and batching settings.
    Config(OperatorConfig),
}

impl Operator {
    /// A replay operator.
    pub fn replay(keys: impl Into<String>) -> Self {
        Self::ReplaySequence(keys.into())
    }

    /// A transform operator.
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&OperatorItem, &OperatorContext) -> Step<TransformOutput> + 'static,
    {
        Self::Transform(Rc::new(f))
    }

    /// Collapse nested configs. Outer settings win over inner ones.
    pub(crate) fn flatten(&self) -> FlatOperator {
        match self {
            Self::ReplaySequence(keys) => FlatOperator::new(Action::Replay(keys.clone())),
            Self::Transform(f) => FlatOperator::new(Action::Transform(Rc::clone(f))),
            Self::Config(config) => {
                let mut flat = config.operator.flatten();
                if config.before.is_some() {
                    flat.before = config.before.clone();
                }
                if config.after.is_some() {
                    flat.after = config.after.clone();
                }
                if config.batch_size.is_some() {
                    flat.batch_size = config.batch_size;
                }
                flat.uses_register |= config.uses_register;
                flat
            }
        }
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaySequence(keys) => f.debug_tuple("ReplaySequence").field(keys).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
            Self::Config(config) => f.debug_tuple("Config").field(config).finish(),
        }
    }
}

impl From<OperatorConfig> for Operator {
    fn from(config: OperatorConfig) -> Self {
        Self::Config(config)
    }
}

/// Hooks and settings around an inner operator.
#[derive(Clone)]
pub struct OperatorConfig {
    /// Runs after collection; may veto.
    pub before: Option<Rc<BeforeHook>>,
    /// Runs after application.
    pub after: Option<Rc<AfterHook>>,
    /// Maximum transforms in flight. Falls back to the engine default.
    pub batch_size: Option<usize>,
    /// Capture the original text of processed items into a register.
    pub uses_register: bool,
    /// The wrapped operator.
    pub operator: Box<Operator>,
}

impl OperatorConfig {
    /// Wrap `operator` with no hooks.
    pub fn new(operator: Operator) -> Self {
        Self {
            before: None,
            after: None,
            batch_size: None,
            uses_register: false,
            operator: Box::new(operator),
        }
    }

    /// Set the before hook.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[OperatorItem], &OperatorContext) -> Step<()> + 'static,
    {
        self.before = Some(Rc::new(hook));
        self
    }

    /// Set the after hook.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[(AnchorId, Span)], &OperatorContext) + 'static,
    {
        self.after = Some(Rc::new(hook));
        self
    }

    /// Set the batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Capture processed text into the run's register.
    pub fn uses_register(mut self, uses: bool) -> Self {
        self.uses_register = uses;
        self
    }
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("batch_size", &self.batch_size)
            .field("uses_register", &self.uses_register)
            .field("operator", &self.operator)
            .finish()
    }
}

pub(crate) enum Action {
    Replay(String),
    Transform(Rc<TransformFn>),
}

pub(crate) struct FlatOperator {
    pub(crate) action: Action,
    pub(crate) before: Option<Rc<BeforeHook>>,
    pub(crate) after: Option<Rc<AfterHook>>,
    pub(crate) batch_size: Option<usize>,
    pub(crate) uses_register: bool,
}

impl FlatOperator {
    fn new(action: Action) -> Self {
        Self {
            action,
            before: None,
            after: None,
            batch_size: None,
            uses_register: false,
        }
    }
}

/// One marked span handed to an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorItem {
    /// Position in collection order.
    pub index: usize,
    /// Anchor id of the mark.
    pub id: AnchorId,
    /// The span the operator works on, including any "around" whitespace.
    pub span: Span,
    /// Text of `span` at collection time.
    pub text: Vec<String>,
}

impl OperatorItem {
    /// The item text with lines joined by `'\n'`.
    pub fn joined(&self) -> String {
        self.text.join("\n")
    }
}

/// How the operator was triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperatorMode {
    /// From normal mode, over a motion.
    #[default]
    Normal,
    /// Over the visual selection.
    Visual,
    /// As a modifier of a pending operator; the typed count limits the marks processed.
    Pending,
}

/// Read-only state shared with transforms and hooks.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    /// Buffer being operated on.
    pub buffer: BufferId,
    /// Window the operator was triggered from.
    pub window: WindowId,
    /// Trigger mode.
    pub mode: OperatorMode,
    /// Register receiving captured text, if the operator uses one.
    pub register: Option<String>,
    /// `(id, span)` of every collected mark, in collection order.
    pub marks: Vec<(AnchorId, Span)>,
    /// Pattern snapshot at collection time.
    pub patterns: Vec<Pattern>,
}

/// The range that bounds which marks an operator processes.
#[derive(Clone, Default)]
pub enum Motion {
    /// An explicit range.
    Span(Span),
    /// The window's visual selection.
    Selection,
    /// The whole buffer.
    #[default]
    Buffer,
    /// `n` whole lines starting at the cursor line.
    Lines(usize),
    /// Computed from the cursor when the operator runs.
    FromCursor(Rc<dyn Fn(Location) -> Option<Span>>),
}

impl Motion {
    /// A motion computed from the cursor location at execution time.
    pub fn from_cursor<F>(f: F) -> Self
    where
        F: Fn(Location) -> Option<Span> + 'static,
    {
        Self::FromCursor(Rc::new(f))
    }
}

impl fmt::Debug for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Span(span) => f.debug_tuple("Span").field(span).finish(),
            Self::Selection => f.write_str("Selection"),
            Self::Buffer => f.write_str("Buffer"),
            Self::Lines(n) => f.debug_tuple("Lines").field(n).finish(),
            Self::FromCursor(_) => f.write_str("FromCursor(..)"),
        }
    }
}

/// Per-invocation options of [`Session::run_operator`](crate::Session::run_operator).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Trigger mode.
    pub mode: OperatorMode,
    /// Register name; defaults to the engine's default register.
    pub register: Option<String>,
    /// Operate on the bare match instead of the match plus adjoining whitespace.
    /// Defaults to [`EngineConfig::inner`](crate::EngineConfig::inner).
    pub inner: Option<bool>,
    /// Range of marks to process.
    pub motion: Motion,
    /// This run is a dot-repeat of the previous one.
    pub repeat: bool,
}

impl RunOptions {
    /// Options operating on `motion` with defaults otherwise.
    pub fn over(motion: Motion) -> Self {
        Self {
            motion,
            ..Self::default()
        }
    }

    /// Set the mode.
    pub fn mode(mut self, mode: OperatorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the register.
    pub fn register(mut self, name: impl Into<String>) -> Self {
        self.register = Some(name.into());
        self
    }

    /// Set whether whitespace around matches is excluded.
    pub fn inner(mut self, inner: bool) -> Self {
        self.inner = Some(inner);
        self
    }
}
