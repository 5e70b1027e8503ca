//! Undo/redo history for the staged change store.
//!
//! Each entry is a reversible record of one store mutation with enough payload
//! to both reapply and invert it; the store never snapshots its whole state.

use std::collections::VecDeque;

use crate::staging::{InsertId, PendingInsert};
use crate::types::{RecordIdentity, Value};

/// Default number of undoable operations kept before the oldest is dropped.
pub const DEFAULT_HISTORY_DEPTH: usize = 1_000;

/// State of one pending-insert cell, captured before and after an edit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InsertCell {
    pub value: Value,
    pub explicit_auto: bool,
    pub database_default: bool,
}

/// One reversible store mutation.
#[derive(Debug, Clone)]
pub(crate) enum Change {
    /// A new row was prepended to the pending inserts.
    InsertAdded { insert: PendingInsert },
    /// A pending insert was dropped from `position`.
    InsertRemoved {
        position: usize,
        insert: PendingInsert,
    },
    /// A cell of a pending insert changed.
    InsertCellChanged {
        id: InsertId,
        column: usize,
        from: InsertCell,
        to: InsertCell,
    },
    /// A staged change on a persisted row changed; `None` means "no change
    /// staged", i.e. the persisted value.
    RecordCellChanged {
        signature: String,
        identity: RecordIdentity,
        column: usize,
        from: Option<Value>,
        to: Option<Value>,
    },
    /// A persisted row was marked (`marked == true`) or unmarked for deletion.
    DeleteToggled {
        signature: String,
        identity: RecordIdentity,
        marked: bool,
    },
}

/// Two stacks of reversible changes.
#[derive(Debug)]
pub(crate) struct History {
    undo_stack: VecDeque<Change>,
    redo_stack: Vec<Change>,
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Records a freshly staged change and invalidates everything redoable.
    pub fn record(&mut self, change: Change) {
        self.redo_stack.clear();
        self.push_undo(change);
    }

    /// Drops everything redoable without recording a change.
    pub fn clear_redo(&mut self) {
        self.redo_stack.clear();
    }

    /// Pushes onto the undo stack without touching the redo stack.
    pub fn push_undo(&mut self, change: Change) {
        self.undo_stack.push_back(change);
        // Enforce depth limit by dropping oldest entry
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    pub fn pop_undo(&mut self) -> Option<Change> {
        self.undo_stack.pop_back()
    }

    pub fn push_redo(&mut self, change: Change) {
        self.redo_stack.push(change);
    }

    pub fn pop_redo(&mut self) -> Option<Change> {
        self.redo_stack.pop()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}
