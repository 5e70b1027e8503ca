//! Mutation planner: turns a [`StagedChanges`] store into a [`TableChanges`]
//! batch for the mutation engine.
//!
//! Planning is the last point where a save can be refused without touching the
//! database, so every batch it returns is complete: inserts carry a value for
//! each column the database cannot fill in itself, and no update targets a
//! row that the same batch deletes.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{EditError, Result};
use crate::staging::{PendingInsert, StagedChanges};
use crate::types::{Column, ColumnValue, RecordDelete, RecordInsert, RecordUpdate, TableChanges};

/// Builds the batch for everything currently staged.
///
/// Inserts keep their staged (newest-first) order; updates and deletes are
/// ordered by identity signature.
///
/// # Errors
///
/// - [`EditError::MissingInsertValues`] if an insert leaves a required column
///   empty, or would insert no column at all.
/// - [`EditError::MissingRecordChanges`] / [`EditError::MissingRecordIdentity`]
///   for a malformed update.
/// - [`EditError::MissingDeleteIdentity`] for a delete without identity.
pub fn plan(staged: &StagedChanges) -> Result<TableChanges> {
    let columns = staged.columns();

    let inserts = staged
        .inserts()
        .iter()
        .map(|insert| plan_insert(insert, columns))
        .collect::<Result<Vec<_>>>()?;

    let mut deleted = BTreeSet::new();
    let mut deletes = Vec::new();
    for delete in staged.deletes() {
        if delete.identity.is_empty() {
            return Err(EditError::MissingDeleteIdentity);
        }
        deleted.insert(delete.identity.signature());
        deletes.push(RecordDelete {
            identity: delete.identity.clone(),
        });
    }

    let mut updates = Vec::new();
    for update in staged.updates() {
        if deleted.contains(&update.identity.signature()) {
            continue;
        }
        if update.identity.is_empty() {
            return Err(EditError::MissingRecordIdentity);
        }
        if update.changes.is_empty() {
            return Err(EditError::MissingRecordChanges);
        }
        let changes = update
            .changes
            .iter()
            .map(|(&index, value)| {
                columns
                    .get(index)
                    .map(|column| ColumnValue::new(column.name.clone(), value.clone()))
                    .ok_or(EditError::ColumnOutOfRange(index))
            })
            .collect::<Result<Vec<_>>>()?;
        updates.push(RecordUpdate {
            identity: update.identity.clone(),
            changes,
        });
    }

    debug!(
        table = %staged.schema().table,
        inserts = inserts.len(),
        updates = updates.len(),
        deletes = deletes.len(),
        "Planned table changes"
    );
    Ok(TableChanges {
        inserts,
        updates,
        deletes,
    })
}

fn plan_insert(insert: &PendingInsert, columns: &[Column]) -> Result<RecordInsert> {
    let mut planned = RecordInsert::default();
    for (&index, value) in insert.values() {
        let column = columns
            .get(index)
            .ok_or(EditError::ColumnOutOfRange(index))?;

        if column.auto_increment {
            if insert.is_explicit_auto(index) {
                planned
                    .explicit_auto_values
                    .push(ColumnValue::new(column.name.clone(), value.clone()));
            }
            continue;
        }
        if insert.uses_database_default(index) {
            continue;
        }
        if requires_value(column) && !value.is_null() && value.display().is_empty() {
            return Err(EditError::MissingInsertValues);
        }
        planned
            .values
            .push(ColumnValue::new(column.name.clone(), value.clone()));
    }

    if planned.values.is_empty() && planned.explicit_auto_values.is_empty() {
        return Err(EditError::MissingInsertValues);
    }
    Ok(planned)
}

/// A column the user must fill in: not nullable, no default to fall back on.
fn requires_value(column: &Column) -> bool {
    !column.nullable && column.default_value.is_none() && !column.auto_increment
}
