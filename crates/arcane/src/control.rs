//! Control transfer: return, break, continue and throw as data.
//!
//! Every call frame owns one transfer slot. Evaluation returns [`Flow`];
//! `Err(Unwind)` means an explicit transfer is active in the current frame
//! and the caller must stop and propagate it (`?` does exactly that).

use crate::composite::CompositeId;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum TransferKind {
    Return,
    /// Loops are unlabeled: the innermost `while` absorbs both.
    Break,
    Continue,
    Throw,
    /// Raised by a nil base inside a nillable context; absorbed there.
    NilUnwrap,
    /// Call stack exhausted; never absorbed by language constructs.
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlTransfer {
    /// `None` marks the implicit tail value of a statement list.
    pub kind: Option<TransferKind>,
    pub value: Option<Value>,
}

impl ControlTransfer {
    pub fn is_explicit(&self) -> bool {
        self.kind.is_some()
    }
}

/// Marker for an active explicit transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unwind;

pub type Flow<T = Option<Value>> = Result<T, Unwind>;

/// One transfer slot per call frame.
#[derive(Debug, Default)]
pub struct ControlStack {
    frames: Vec<Option<ControlTransfer>>,
}

impl ControlStack {
    pub fn push(&mut self) {
        self.frames.push(None);
    }

    pub fn pop(&mut self) -> Option<ControlTransfer> {
        self.frames.pop().flatten()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&self) -> Option<&ControlTransfer> {
        self.frames.last().and_then(Option::as_ref)
    }

    pub fn kind(&self) -> Option<&TransferKind> {
        self.current().and_then(|transfer| transfer.kind.as_ref())
    }

    pub fn is_explicit(&self) -> bool {
        self.kind().is_some()
    }

    /// Replaces the current frame's transfer and returns the displaced one.
    pub fn set(&mut self, value: Option<Value>, kind: Option<TransferKind>) -> Option<ControlTransfer> {
        self.frames
            .last_mut()
            .and_then(|frame| frame.replace(ControlTransfer { kind, value }))
    }

    /// Clears the current frame's transfer and returns it.
    pub fn take(&mut self) -> Option<ControlTransfer> {
        self.frames.last_mut().and_then(Option::take)
    }

    /// Composites held by the values of all active transfers.
    pub fn composites(&self) -> Vec<CompositeId> {
        let mut composites = Vec::new();
        for transfer in self.frames.iter().flatten() {
            if let Some(value) = &transfer.value {
                value.collect_composites(&mut composites);
            }
        }
        composites
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
