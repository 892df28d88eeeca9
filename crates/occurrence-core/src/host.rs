//! The host boundary.
//!
//! The engine never touches text storage, search, or live position tracking directly. Everything
//! it needs from the surrounding editor is expressed by the [`Host`] trait:
//!
//! - buffer primitives (read lines, replace a range, cursor and selection access)
//! - a search primitive (`find next/previous match of P from L`)
//! - live tracking (anchors whose spans follow edits)
//! - named registers (the clipboard equivalent)
//! - undo sequence numbers and change notifications
//! - key-sequence replay and the "repeat last change" handler slot
//!
//! [`MemoryHost`](crate::MemoryHost) is a complete in-memory implementation.

use std::fmt;

use crate::error::Result;
use crate::pattern::Pattern;
use crate::position::{Location, Span, SpanKind};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a text buffer.
    BufferId(u64)
);
id_type!(
    /// Identity of a window (a view on a buffer with its own cursor).
    WindowId(u64)
);
id_type!(
    /// A host-side anchor namespace. Each registry owns one.
    NamespaceId(u32)
);
id_type!(
    /// Identity of a live-tracked anchor.
    AnchorId(u64)
);

/// Flags for [`Host::search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFlags {
    /// Accept a match that starts exactly at the search location.
    pub accept_at_cursor: bool,
    /// Search towards the start of the buffer.
    pub backward: bool,
    /// Continue from the other end of the buffer when nothing is found.
    pub wrap: bool,
}

impl SearchFlags {
    /// Forward search, optionally accepting a match at the start location.
    pub fn forward(accept_at_cursor: bool) -> Self {
        Self {
            accept_at_cursor,
            ..Self::default()
        }
    }

    /// Backward search, optionally accepting a match at the start location.
    pub fn backward(accept_at_cursor: bool) -> Self {
        Self {
            accept_at_cursor,
            backward: true,
            wrap: false,
        }
    }

    /// Returns the same flags with wrapping set.
    pub fn wrapping(self, wrap: bool) -> Self {
        Self { wrap, ..self }
    }
}

/// Flags for [`Host::feed_keys`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayFlags {
    /// Resolve user mappings before executing the sequence.
    pub remap: bool,
    /// Merge the resulting edit into the previous undo step.
    pub join_undo: bool,
}

/// Contents of a named register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterContents {
    /// Register text; lines are joined with `'\n'`.
    pub text: String,
    /// Shape the text was captured with.
    pub kind: SpanKind,
}

/// Everything the occurrence engine consumes from its editor.
///
/// Methods that only observe take `&self`; the engine assumes exclusive access to the host for
/// the duration of one operator invocation.
pub trait Host {
    // -- buffers ---------------------------------------------------------------------------

    /// Number of lines in `buffer` (at least 1).
    fn line_count(&self, buffer: BufferId) -> Result<usize>;

    /// Text of one line, without its line terminator.
    fn line(&self, buffer: BufferId, line: usize) -> Result<String>;

    /// Length of one line in characters.
    fn line_len(&self, buffer: BufferId, line: usize) -> Result<usize> {
        Ok(self.line(buffer, line)?.chars().count())
    }

    /// Text covered by `span`, split into lines.
    fn text(&self, buffer: BufferId, span: Span) -> Result<Vec<String>>;

    /// Replace `span` with `lines`.
    ///
    /// When `join_undo` is set the edit becomes part of the previous undo step.
    fn replace(
        &mut self,
        buffer: BufferId,
        span: Span,
        lines: &[String],
        join_undo: bool,
    ) -> Result<()>;

    // -- windows ---------------------------------------------------------------------------

    /// The buffer displayed in `window`.
    fn window_buffer(&self, window: WindowId) -> Result<BufferId>;

    /// Cursor location of `window`.
    fn cursor(&self, window: WindowId) -> Result<Location>;

    /// Move the cursor of `window`.
    fn set_cursor(&mut self, window: WindowId, at: Location) -> Result<()>;

    /// The active selection of `window`, if any.
    fn selection(&self, window: WindowId) -> Result<Option<Span>>;

    /// Select `span` in `window` using the span's shape.
    fn set_selection(&mut self, window: WindowId, span: Span) -> Result<()>;

    // -- search ----------------------------------------------------------------------------

    /// Find the next (or previous) match of `pattern` from `from`.
    ///
    /// Must be free of side effects.
    fn search(
        &self,
        buffer: BufferId,
        pattern: &Pattern,
        from: Location,
        flags: SearchFlags,
    ) -> Result<Option<Span>>;

    /// The most recent user search, as a raw pattern.
    fn last_search(&self) -> Option<String>;

    // -- live tracking ---------------------------------------------------------------------

    /// Allocate a fresh anchor namespace.
    fn create_namespace(&mut self, name: &str) -> NamespaceId;

    /// Register `span` in `namespace`, reusing `id` when given.
    fn anchor_set(
        &mut self,
        buffer: BufferId,
        namespace: NamespaceId,
        id: Option<AnchorId>,
        span: Span,
    ) -> Result<AnchorId>;

    /// Current span of an anchor, or `None` if it does not exist.
    fn anchor_get(
        &self,
        buffer: BufferId,
        namespace: NamespaceId,
        id: AnchorId,
    ) -> Result<Option<Span>>;

    /// Delete an anchor. Returns whether it existed.
    fn anchor_delete(
        &mut self,
        buffer: BufferId,
        namespace: NamespaceId,
        id: AnchorId,
    ) -> Result<bool>;

    /// Snapshot of the anchors in `namespace` whose current span lies inside `bounds`, ordered
    /// by start location.
    fn anchors_in(
        &self,
        buffer: BufferId,
        namespace: NamespaceId,
        bounds: Option<Span>,
    ) -> Result<Vec<(AnchorId, Span)>>;

    /// Delete every anchor in `namespace`.
    fn anchor_clear(&mut self, buffer: BufferId, namespace: NamespaceId) -> Result<()>;

    // -- registers -------------------------------------------------------------------------

    /// Read a named register.
    fn register(&self, name: &str) -> Option<RegisterContents>;

    /// Write a named register.
    fn set_register(&mut self, name: &str, contents: RegisterContents) -> Result<()>;

    // -- undo ------------------------------------------------------------------------------

    /// The buffer's current undo sequence number.
    fn undo_seq(&self, buffer: BufferId) -> Result<u64>;

    /// Start delivering text-change notifications for `buffer`.
    fn attach_change_listener(&mut self, buffer: BufferId) -> Result<()>;

    /// Stop delivering text-change notifications for `buffer`.
    fn detach_change_listener(&mut self, buffer: BufferId) -> Result<()>;

    // -- replay ----------------------------------------------------------------------------

    /// Execute a literal key sequence as if typed in `window`.
    fn feed_keys(&mut self, window: WindowId, keys: &str, flags: ReplayFlags) -> Result<()>;

    /// The handler the "repeat last change" key currently invokes.
    fn repeat_handler(&self) -> Option<String>;

    /// Replace the "repeat last change" handler.
    fn set_repeat_handler(&mut self, handler: Option<String>);

    /// The count typed before the pending operator (0 when none).
    fn count(&self) -> usize;
}
