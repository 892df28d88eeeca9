//! Register capture for operators.

use crate::error::Result;
use crate::host::{Host, RegisterContents};
use crate::position::SpanKind;

/// Accumulates text fragments during one operator run and writes them to a named host register.
///
/// Fragments may arrive in any order; they are written in ascending item order, joined by
/// newlines. A register is committed at most once.
#[derive(Debug, Clone)]
pub struct Register {
    name: String,
    kind: SpanKind,
    pending: Vec<(usize, String)>,
    committed: bool,
}

impl Register {
    /// Create an empty register buffer targeting `name`.
    pub fn new(name: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            name: name.into(),
            kind,
            pending: Vec::new(),
            committed: false,
        }
    }

    /// Target register name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape the text is written with.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns `true` if no fragment has been captured.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns `true` once the register has been written.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Capture the text of the item at `index`.
    pub fn push(&mut self, index: usize, text: impl Into<String>) {
        self.pending.push((index, text.into()));
    }

    /// Drop every captured fragment.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// The text that would be written.
    pub fn contents(&self) -> String {
        let mut fragments: Vec<&(usize, String)> = self.pending.iter().collect();
        fragments.sort_by_key(|(index, _)| *index);
        fragments
            .into_iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write the captured text to the host. Returns whether anything was written.
    pub fn commit<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<bool> {
        if self.committed || self.pending.is_empty() {
            return Ok(false);
        }
        let text = self.contents();
        log::debug!(
            "register {:?}: writing {} fragments",
            self.name,
            self.pending.len()
        );
        host.set_register(
            &self.name,
            RegisterContents {
                text,
                kind: self.kind,
            },
        )?;
        self.committed = true;
        self.pending.clear();
        Ok(true)
    }
}
