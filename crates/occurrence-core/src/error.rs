//! Error type shared by every fallible operation.

use thiserror::Error;

use crate::host::{AnchorId, BufferId, WindowId};
use crate::position::Location;

/// Errors produced by the occurrence engine and by [`Host`](crate::Host) implementations.
///
/// Every variant is a precondition or invariant violation: the current call is aborted and no
/// partial recovery is attempted. Expected absence (no match, no word under the cursor, an empty
/// selection) is never reported through this type; those paths return `Ok(None)` / `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OccurrenceError {
    #[error("occurrence for buffer {0} has been disposed")]
    /// The occurrence was disposed and can no longer be used.
    Disposed(BufferId),

    #[error("anchor {0} is registered but has no host-side mark")]
    /// A registry entry lost its live-tracking anchor on the host side.
    MissingAnchor(AnchorId),

    #[error("invalid span: start {start} is after stop {stop}")]
    /// A span was constructed with `start > stop`.
    InvalidSpan {
        /// Requested start.
        start: Location,
        /// Requested stop.
        stop: Location,
    },

    #[error("invalid span key '{0}'")]
    /// A serialized span key could not be parsed.
    InvalidKey(String),

    #[error("occurrence has no patterns")]
    /// The operation needs at least one pattern.
    NoPatterns,

    #[error("pattern text is empty")]
    /// An empty pattern text was supplied.
    EmptyPattern,

    #[error("invalid search pattern '{pattern}': {message}")]
    /// The host could not compile a pattern.
    InvalidPattern {
        /// The normalized pattern.
        pattern: String,
        /// The compiler error message.
        message: String,
    },

    #[error("unknown buffer {0}")]
    /// The host does not know this buffer.
    UnknownBuffer(BufferId),

    #[error("unknown window {0}")]
    /// The host does not know this window.
    UnknownWindow(WindowId),

    #[error("window {window} shows buffer {actual}, expected buffer {expected}")]
    /// An occurrence was used with a window that displays another buffer.
    BufferMismatch {
        /// The window that was passed in.
        window: WindowId,
        /// The occurrence's buffer.
        expected: BufferId,
        /// The buffer the window actually shows.
        actual: BufferId,
    },

    #[error("location {0} is outside the buffer")]
    /// A location does not exist in the buffer.
    OutOfBounds(Location),

    #[error("invalid transform result for item {index}: {reason}")]
    /// A transform operator produced a result the engine cannot apply.
    InvalidTransformResult {
        /// Collection index of the offending item.
        index: usize,
        /// What was wrong with the result.
        reason: &'static str,
    },

    #[error("host error: {0}")]
    /// Any other failure reported by the host.
    Host(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = OccurrenceError> = std::result::Result<T, E>;
