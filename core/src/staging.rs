//! The staged change store: pending inserts, updates and deletes for one table.
//!
//! Staging is pure in-memory bookkeeping. Persisted rows are addressed through
//! their identity signature (see [`identity`](crate::identity)), so edits stay
//! attached to the right row however the caller pages or filters its listing.
//! Pending inserts carry a stable [`InsertId`] so history entries can find them
//! again after other inserts were added or removed.
//!
//! Every operation either fully applies and records one history entry, or
//! fails and leaves the store untouched.
//!
//! # Examples
//!
//! ```
//! use dbc_core::{Column, RecordRow, RowRef, StagedChanges, TableSchema, Value};
//!
//! let schema = TableSchema::new(
//!     "users",
//!     vec![Column::new("id", "INTEGER").primary_key(), Column::new("name", "TEXT")],
//! );
//! let mut staged = StagedChanges::new(schema);
//! let row = RecordRow::new(["1", "alice"]);
//!
//! staged.stage_cell_edit(RowRef::Persisted(&row), 1, Value::text("bob")).unwrap();
//! assert_eq!(staged.dirty_count(), 1);
//!
//! // Re-entering the persisted value cancels the edit.
//! staged.stage_cell_edit(RowRef::Persisted(&row), 1, Value::text("alice")).unwrap();
//! assert!(!staged.has_dirty_edits());
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::codec::{self, DefaultValue};
use crate::error::{EditError, Result};
use crate::history::{Change, History, InsertCell};
use crate::identity;
use crate::types::{Column, RecordIdentity, RecordRow, TableSchema, Value};

/// Stable handle of a pending insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InsertId(u64);

/// A new row that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInsert {
    id: InsertId,
    values: BTreeMap<usize, Value>,
    explicit_auto: BTreeSet<usize>,
    database_defaults: BTreeSet<usize>,
}

impl PendingInsert {
    pub fn id(&self) -> InsertId {
        self.id
    }

    /// Staged value for a column index.
    pub fn value(&self, column: usize) -> Option<&Value> {
        self.values.get(&column)
    }

    /// All staged values keyed by column index.
    pub fn values(&self) -> &BTreeMap<usize, Value> {
        &self.values
    }

    /// Returns `true` if the user forced a value into this auto-increment column.
    pub fn is_explicit_auto(&self, column: usize) -> bool {
        self.explicit_auto.contains(&column)
    }

    /// Returns `true` if the column still holds an unedited SQL expression
    /// default that the database must evaluate.
    pub fn uses_database_default(&self, column: usize) -> bool {
        self.database_defaults.contains(&column)
    }

    fn cell(&self, column: usize) -> InsertCell {
        InsertCell {
            value: self.values.get(&column).cloned().unwrap_or(Value::Null),
            explicit_auto: self.explicit_auto.contains(&column),
            database_default: self.database_defaults.contains(&column),
        }
    }

    fn set_cell(&mut self, column: usize, cell: &InsertCell) {
        self.values.insert(column, cell.value.clone());
        set_membership(&mut self.explicit_auto, column, cell.explicit_auto);
        set_membership(&mut self.database_defaults, column, cell.database_default);
    }
}

/// Column-indexed changes to one persisted row. Never empty while stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub identity: RecordIdentity,
    pub changes: BTreeMap<usize, Value>,
}

/// A persisted row marked for deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelete {
    pub identity: RecordIdentity,
}

/// What a staging operation targets.
#[derive(Debug, Clone, Copy)]
pub enum RowRef<'a> {
    /// Pending insert at this position (0 = newest).
    Insert(usize),
    /// A row as persisted in the database, with its original display values.
    Persisted(&'a RecordRow),
}

/// Pending edits for one table plus their undo/redo history.
#[derive(Debug)]
pub struct StagedChanges {
    schema: TableSchema,
    inserts: Vec<PendingInsert>,
    updates: BTreeMap<String, PendingUpdate>,
    deletes: BTreeMap<String, PendingDelete>,
    history: History,
    next_insert_id: u64,
}

impl StagedChanges {
    /// Creates an empty store for the given schema snapshot.
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            inserts: Vec::new(),
            updates: BTreeMap::new(),
            deletes: BTreeMap::new(),
            history: History::default(),
            next_insert_id: 0,
        }
    }

    /// Creates an empty store whose history keeps at most `depth` entries.
    pub fn with_history_depth(schema: TableSchema, depth: usize) -> Self {
        Self {
            history: History::new(depth),
            ..Self::new(schema)
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.schema.columns
    }

    /// Pending inserts, newest first.
    pub fn inserts(&self) -> &[PendingInsert] {
        &self.inserts
    }

    /// Pending updates, ordered by identity signature.
    pub fn updates(&self) -> impl Iterator<Item = &PendingUpdate> {
        self.updates.values()
    }

    /// Pending deletes, ordered by identity signature.
    pub fn deletes(&self) -> impl Iterator<Item = &PendingDelete> {
        self.deletes.values()
    }

    /// Prepends a new row populated with column defaults and returns its id.
    ///
    /// Each column starts with its default (a literal the client binds, or an
    /// expression left to the database), else `NULL` if nullable, else an
    /// empty placeholder the user must fill in before saving.
    pub fn add_insert(&mut self) -> InsertId {
        let insert = self.new_insert();
        let id = insert.id;
        self.apply_and_record(Change::InsertAdded { insert });
        debug!(table = %self.schema.table, "Staged new row");
        id
    }

    /// Drops the pending insert at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InsertOutOfRange`] if there is no such insert.
    pub fn remove_insert(&mut self, index: usize) -> Result<()> {
        let insert = self
            .inserts
            .get(index)
            .cloned()
            .ok_or(EditError::InsertOutOfRange(index))?;
        self.apply_and_record(Change::InsertRemoved {
            position: index,
            insert,
        });
        Ok(())
    }

    /// Stages a new value for one cell.
    ///
    /// On a pending insert the value is written directly; writing an
    /// auto-increment column marks it as explicitly overridden. On a persisted
    /// row the value is diffed against the row's original display value:
    /// matching it removes the column's change (and the whole update once no
    /// column differs). An edit that leaves the staged value unchanged records
    /// nothing but still counts as a new action, so the redo stack is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::ColumnOutOfRange`], [`EditError::InsertOutOfRange`],
    /// or an identity resolution failure. The store is unchanged on error.
    pub fn stage_cell_edit(&mut self, row: RowRef<'_>, column: usize, value: Value) -> Result<()> {
        let auto_increment = self
            .schema
            .columns
            .get(column)
            .ok_or(EditError::ColumnOutOfRange(column))?
            .auto_increment;

        match row {
            RowRef::Insert(index) => {
                let insert = self
                    .inserts
                    .get(index)
                    .ok_or(EditError::InsertOutOfRange(index))?;
                let from = insert.cell(column);
                let to = InsertCell {
                    value,
                    explicit_auto: from.explicit_auto || auto_increment,
                    database_default: false,
                };
                if from != to {
                    let id = insert.id;
                    self.apply_and_record(Change::InsertCellChanged {
                        id,
                        column,
                        from,
                        to,
                    });
                } else {
                    self.history.clear_redo();
                }
            }
            RowRef::Persisted(record) => {
                let identity = identity::build_identity(record, &self.schema.columns)?;
                let signature = identity::row_signature(record, &self.schema.columns)?;
                let original = record
                    .get(column)
                    .ok_or(EditError::ColumnOutOfRange(column))?;

                let from = self
                    .updates
                    .get(&signature)
                    .and_then(|update| update.changes.get(&column))
                    .cloned();
                let to = (value.display() != original).then_some(value);
                if from != to {
                    self.apply_and_record(Change::RecordCellChanged {
                        signature,
                        identity,
                        column,
                        from,
                        to,
                    });
                } else {
                    self.history.clear_redo();
                }
            }
        }
        Ok(())
    }

    /// Toggles deletion of a row and returns whether it is now marked.
    ///
    /// A pending insert has nothing to delete, so it is removed outright and
    /// `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InsertOutOfRange`] or an identity resolution
    /// failure. The store is unchanged on error.
    pub fn toggle_delete(&mut self, row: RowRef<'_>) -> Result<bool> {
        match row {
            RowRef::Insert(index) => {
                self.remove_insert(index)?;
                Ok(false)
            }
            RowRef::Persisted(record) => {
                let identity = identity::build_identity(record, &self.schema.columns)?;
                let signature = identity::row_signature(record, &self.schema.columns)?;
                let marked = !self.deletes.contains_key(&signature);
                self.apply_and_record(Change::DeleteToggled {
                    signature,
                    identity,
                    marked,
                });
                Ok(marked)
            }
        }
    }

    /// Reverts the most recent staged operation. Returns `false` if there was
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(change) = self.history.pop_undo() else {
            return false;
        };
        self.apply(&change, false);
        self.history.push_redo(change);
        true
    }

    /// Reapplies the most recently undone operation. Returns `false` if there
    /// was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(change) = self.history.pop_redo() else {
            return false;
        };
        self.apply(&change, true);
        self.history.push_undo(change);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.undo_depth() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history.redo_depth() > 0
    }

    /// Discards all staged changes and the history.
    pub fn clear(&mut self) {
        self.inserts.clear();
        self.updates.clear();
        self.deletes.clear();
        self.history.clear();
    }

    /// Changed cells across all updates, plus pending inserts and deletes.
    pub fn dirty_count(&self) -> usize {
        let changed_cells: usize = self.updates.values().map(|u| u.changes.len()).sum();
        changed_cells + self.inserts.len() + self.deletes.len()
    }

    pub fn has_dirty_edits(&self) -> bool {
        self.dirty_count() > 0
    }

    /// Staged value for a cell, if one is pending.
    pub fn staged_value(&self, row: RowRef<'_>, column: usize) -> Option<&Value> {
        match row {
            RowRef::Insert(index) => self.inserts.get(index)?.value(column),
            RowRef::Persisted(record) => self.pending_update(record)?.changes.get(&column),
        }
    }

    /// Pending update for a persisted row, if any.
    pub fn pending_update(&self, record: &RecordRow) -> Option<&PendingUpdate> {
        let signature = identity::row_signature(record, &self.schema.columns).ok()?;
        self.updates.get(&signature)
    }

    /// Returns `true` if the persisted row is marked for deletion.
    pub fn is_marked_for_delete(&self, record: &RecordRow) -> bool {
        identity::row_signature(record, &self.schema.columns)
            .is_ok_and(|signature| self.deletes.contains_key(&signature))
    }

    fn new_insert(&mut self) -> PendingInsert {
        let id = InsertId(self.next_insert_id);
        self.next_insert_id += 1;

        let mut insert = PendingInsert {
            id,
            values: BTreeMap::new(),
            explicit_auto: BTreeSet::new(),
            database_defaults: BTreeSet::new(),
        };
        for (index, column) in self.schema.columns.iter().enumerate() {
            let value = match codec::default_value(column) {
                Some(DefaultValue::Literal(value)) => value,
                Some(DefaultValue::Expression(text)) => {
                    insert.database_defaults.insert(index);
                    Value::untyped(text)
                }
                None if column.nullable => Value::Null,
                None => Value::untyped(""),
            };
            insert.values.insert(index, value);
        }
        insert
    }

    fn apply_and_record(&mut self, change: Change) {
        self.apply(&change, true);
        self.history.record(change);
    }

    /// Applies `change` forwards, or its inverse when `forward` is false.
    fn apply(&mut self, change: &Change, forward: bool) {
        match change {
            Change::InsertAdded { insert } => {
                if forward {
                    self.inserts.insert(0, insert.clone());
                } else {
                    self.inserts.retain(|i| i.id != insert.id);
                }
            }
            Change::InsertRemoved { position, insert } => {
                if forward {
                    self.inserts.retain(|i| i.id != insert.id);
                } else {
                    let position = (*position).min(self.inserts.len());
                    self.inserts.insert(position, insert.clone());
                }
            }
            Change::InsertCellChanged {
                id,
                column,
                from,
                to,
            } => {
                let cell = if forward { to } else { from };
                if let Some(insert) = self.inserts.iter_mut().find(|i| i.id == *id) {
                    insert.set_cell(*column, cell);
                }
            }
            Change::RecordCellChanged {
                signature,
                identity,
                column,
                from,
                to,
            } => {
                let value = if forward { to } else { from };
                self.set_record_change(signature, identity, *column, value.clone());
            }
            Change::DeleteToggled {
                signature,
                identity,
                marked,
            } => {
                if *marked == forward {
                    self.deletes.insert(
                        signature.clone(),
                        PendingDelete {
                            identity: identity.clone(),
                        },
                    );
                } else {
                    self.deletes.remove(signature);
                }
            }
        }
    }

    fn set_record_change(
        &mut self,
        signature: &str,
        identity: &RecordIdentity,
        column: usize,
        value: Option<Value>,
    ) {
        match value {
            Some(value) => {
                self.updates
                    .entry(signature.to_string())
                    .or_insert_with(|| PendingUpdate {
                        identity: identity.clone(),
                        changes: BTreeMap::new(),
                    })
                    .changes
                    .insert(column, value);
            }
            None => {
                if let Some(update) = self.updates.get_mut(signature) {
                    update.changes.remove(&column);
                    if update.changes.is_empty() {
                        self.updates.remove(signature);
                    }
                }
            }
        }
    }
}

fn set_membership(set: &mut BTreeSet<usize>, column: usize, member: bool) {
    if member {
        set.insert(column);
    } else {
        set.remove(&column);
    }
}
