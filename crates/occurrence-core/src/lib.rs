#![warn(missing_docs)]
//! Occurrence Core - Headless Occurrence Tracking and Batch Operators
//!
//! # Overview
//!
//! `occurrence-core` tracks every occurrence of a set of patterns in a text buffer, lets the user
//! mark a subset of them, and applies one operator to all marked spans in a single step. Spans
//! follow buffer edits through the host's anchor primitive, so marks stay correct while text
//! changes underneath them.
//!
//! The editor itself is abstracted behind the [`Host`] trait. [`MemoryHost`] is a complete
//! in-memory implementation used by the tests and usable as a reference.
//!
//! # Core Features
//!
//! - **Patterns**: whole-word, literal, and raw regex patterns per buffer
//! - **Live Spans**: matches and marks keep their identity across edits
//! - **Merged Enumeration**: matches of all patterns in buffer order, lazily
//! - **Cursor Navigation**: nearest, next, and previous match with wrap-around
//! - **Batch Operators**: key replay or (possibly asynchronous) transforms over every mark
//! - **Undo Awareness**: undoing an operator restores the marks it consumed
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Session (registry, repeat, undo bridge)    │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Operator Engine (collect / apply / commit) │  ← Batch Editing
//! ├─────────────────────────────────────────────┤
//! │  Occurrence (patterns, matches, marks)      │  ← Per-buffer State
//! ├─────────────────────────────────────────────┤
//! │  Anchor Registry + Match Enumeration        │  ← Live Spans
//! ├─────────────────────────────────────────────┤
//! │  Host (buffer, window, anchors, undo, keys) │  ← Editor Boundary
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use occurrence_core::{
//!     EngineConfig, Host, MemoryHost, Operator, PatternKind, RunOptions, Session,
//!     TransformOutput,
//! };
//!
//! let mut host = MemoryHost::new();
//! let buffer = host.add_buffer("foo bar\nbaz foo");
//! let window = host.open_window(buffer);
//!
//! let mut session = Session::new(EngineConfig::default());
//! session.add_pattern(&mut host, buffer, "foo", PatternKind::Word).unwrap();
//! session.get_mut(buffer).unwrap().mark_all(&mut host, None).unwrap();
//!
//! let rename = Operator::transform(|_, _| TransformOutput::from("qux").into());
//! let outcome = session
//!     .run_operator_blocking(&mut host, window, rename, RunOptions::default().inner(true))
//!     .unwrap();
//!
//! assert_eq!(outcome.applied, 2);
//! assert_eq!(host.line(buffer, 1).unwrap(), "baz qux");
//! ```
//!
//! # Module Description
//!
//! - [`host`] - the editor boundary
//! - [`position`] - locations and spans
//! - [`pattern`] - pattern normalization
//! - [`anchors`] - live-tracked span registry
//! - [`matches`] - merged match enumeration
//! - [`occurrence`] - per-buffer patterns, matches, and marks
//! - [`nearest`] - cursor-relative match search
//! - [`operator`] - operator and option types
//! - [`session`] - the registry of occurrences and repeat/undo state
//! - [`memory`] - the in-memory reference host

pub mod anchors;
pub mod config;
pub mod distance;
mod engine;
pub mod error;
pub mod host;
pub mod line_index;
pub mod matches;
pub mod memory;
pub mod nearest;
pub mod occurrence;
pub mod operator;
pub mod pattern;
pub mod position;
pub mod register;
pub mod search;
pub mod session;
pub mod source;
pub mod tracking;
pub mod undo;

pub use anchors::{AnchorIter, AnchorRef, AnchorSet};
pub use config::EngineConfig;
pub use engine::OperatorOutcome;
pub use error::{OccurrenceError, Result};
pub use host::{
    AnchorId, BufferId, Host, NamespaceId, RegisterContents, ReplayFlags, SearchFlags, WindowId,
};
pub use line_index::LineIndex;
pub use matches::Matches;
pub use memory::{KeyHandler, MemoryHost};
pub use nearest::{CursorSearch, Direction};
pub use occurrence::Occurrence;
pub use operator::{
    AfterHook, BeforeHook, Motion, Operator, OperatorConfig, OperatorContext, OperatorItem,
    OperatorMode, RunOptions, Step, TransformFn, TransformOutput,
};
pub use pattern::{Pattern, PatternKind};
pub use position::{Location, Span, SpanKind};
pub use session::Session;
pub use source::PatternSource;
