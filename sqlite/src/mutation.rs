//! Applying a [`TableChanges`] batch in a single transaction.
//!
//! The batch is validated and turned into [`Statement`]s before the
//! transaction starts, so a malformed batch never touches the database. The
//! statements then run in order (inserts, updates, deletes); the first failure
//! rolls everything back.

use std::collections::HashSet;

use dbc_core::{
    ChangeWriter, EditError, RecordDelete, RecordInsert, RecordUpdate, TableChanges, Value,
};
use rusqlite::params_from_iter;
use tracing::{debug, info, warn};

use crate::engine::SqliteEngine;
use crate::error::{Result, SqliteError};
use crate::sql::{Statement, bind_value, identity_clause, quote_identifier};

impl SqliteEngine {
    /// Applies every change in the batch, or none of them.
    ///
    /// Updates whose identity matches a delete in the same batch are skipped.
    ///
    /// # Errors
    ///
    /// - [`SqliteError::MissingTableName`] for a blank table name.
    /// - [`SqliteError::EditError`] for a malformed batch (checked before the
    ///   transaction begins).
    /// - [`SqliteError::StatementError`] naming the failing statement; the
    ///   transaction has been rolled back.
    pub fn apply_changes(&mut self, table: &str, changes: &TableChanges) -> Result<()> {
        let statements = build_statements(table, changes)?;

        let tx = self.conn.transaction()?;
        debug!(table, statements = statements.len(), "Began transaction");
        for statement in &statements {
            if let Err(source) = tx.execute(&statement.sql, params_from_iter(statement.params.iter())) {
                warn!(table, statement = %statement.sql, error = %source, "Statement failed, rolling back");
                if let Err(rollback) = tx.rollback() {
                    warn!(table, error = %rollback, "Rollback failed");
                }
                return Err(SqliteError::StatementError {
                    statement: statement.sql.clone(),
                    source,
                });
            }
        }
        tx.commit()?;
        info!(
            table,
            inserts = changes.inserts.len(),
            updates = changes.updates.len(),
            deletes = changes.deletes.len(),
            "Committed changes"
        );
        Ok(())
    }
}

impl ChangeWriter for SqliteEngine {
    type Error = SqliteError;

    fn apply_changes(&mut self, table: &str, changes: &TableChanges) -> Result<()> {
        SqliteEngine::apply_changes(self, table, changes)
    }
}

/// Validates a batch and builds its statements in execution order.
///
/// # Errors
///
/// Returns [`SqliteError::MissingTableName`], or an [`EditError`] for an
/// empty or malformed batch.
pub fn build_statements(table: &str, changes: &TableChanges) -> Result<Vec<Statement>> {
    if table.trim().is_empty() {
        return Err(SqliteError::MissingTableName);
    }
    if changes.is_empty() {
        return Err(EditError::MissingTableChanges.into());
    }

    let mut statements = Vec::with_capacity(changes.len());
    for insert in &changes.inserts {
        statements.push(insert_statement(table, insert)?);
    }

    let deleted: HashSet<String> = changes
        .deletes
        .iter()
        .map(|delete| delete.identity.signature())
        .collect();
    for update in &changes.updates {
        if deleted.contains(&update.identity.signature()) {
            continue;
        }
        statements.push(update_statement(table, update)?);
    }

    for delete in &changes.deletes {
        statements.push(delete_statement(table, delete)?);
    }
    Ok(statements)
}

/// `INSERT INTO "t" ("c1", "c2") VALUES (?, ?)`.
///
/// Regular values come first, then explicit auto-increment values. A column
/// named twice keeps its first position and its last value.
pub fn insert_statement(table: &str, insert: &RecordInsert) -> Result<Statement> {
    let mut columns: Vec<&str> = Vec::new();
    let mut values: Vec<&Value> = Vec::new();
    for column_value in insert.values.iter().chain(&insert.explicit_auto_values) {
        let column = column_value.column.trim();
        if column.is_empty() {
            return Err(EditError::MissingInsertValues.into());
        }
        match columns.iter().position(|c| *c == column) {
            Some(i) => values[i] = &column_value.value,
            None => {
                columns.push(column);
                values.push(&column_value.value);
            }
        }
    }
    if columns.is_empty() {
        return Err(EditError::MissingInsertValues.into());
    }

    let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders = vec!["?"; columns.len()];
    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            quoted.join(", "),
            placeholders.join(", ")
        ),
        params: values.into_iter().map(bind_value).collect(),
    })
}

/// `UPDATE "t" SET "c" = ?, ... WHERE <identity>`.
pub fn update_statement(table: &str, update: &RecordUpdate) -> Result<Statement> {
    if update.changes.is_empty() {
        return Err(EditError::MissingRecordChanges.into());
    }
    let mut set_parts = Vec::with_capacity(update.changes.len());
    let mut params = Vec::with_capacity(update.changes.len());
    for change in &update.changes {
        if change.column.trim().is_empty() {
            return Err(EditError::MissingRecordChanges.into());
        }
        set_parts.push(format!("{} = ?", quote_identifier(&change.column)));
        params.push(bind_value(&change.value));
    }

    let (clause, identity_params) = identity_clause(&update.identity)?;
    params.extend(identity_params);
    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} {}",
            quote_identifier(table),
            set_parts.join(", "),
            clause
        ),
        params,
    })
}

/// `DELETE FROM "t" WHERE <identity>`.
pub fn delete_statement(table: &str, delete: &RecordDelete) -> Result<Statement> {
    if delete.identity.is_empty() {
        return Err(EditError::MissingDeleteIdentity.into());
    }
    let (clause, params) = identity_clause(&delete.identity)?;
    Ok(Statement {
        sql: format!("DELETE FROM {} {}", quote_identifier(table), clause),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbc_core::{ColumnValue, RawValue, RecordIdentity};
    use rusqlite::types::Value as SqlValue;

    fn int(i: i64) -> Value {
        Value::Typed {
            text: i.to_string(),
            raw: Some(RawValue::Integer(i)),
        }
    }

    fn by_id(id: i64) -> RecordIdentity {
        RecordIdentity::Keys(vec![ColumnValue::new("id", int(id))])
    }

    #[test]
    fn test_insert_statement_collapses_duplicate_columns() {
        let insert = RecordInsert {
            values: vec![
                ColumnValue::new("name", Value::text("dan")),
                ColumnValue::new("note", Value::Null),
            ],
            explicit_auto_values: vec![
                ColumnValue::new("id", int(10)),
                ColumnValue::new("name", Value::text("danny")),
            ],
        };
        let statement = insert_statement("users", &insert).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"users\" (\"name\", \"note\", \"id\") VALUES (?, ?, ?)"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("danny".into()),
                SqlValue::Null,
                SqlValue::Integer(10)
            ]
        );
    }

    #[test]
    fn test_insert_statement_requires_columns() {
        let empty = RecordInsert::default();
        assert!(matches!(
            insert_statement("users", &empty),
            Err(SqliteError::EditError(EditError::MissingInsertValues))
        ));
        let blank = RecordInsert {
            values: vec![ColumnValue::new(" ", Value::text("x"))],
            ..RecordInsert::default()
        };
        assert!(matches!(
            insert_statement("users", &blank),
            Err(SqliteError::EditError(EditError::MissingInsertValues))
        ));
    }

    #[test]
    fn test_update_statement_binds_set_then_identity() {
        let update = RecordUpdate {
            identity: by_id(1),
            changes: vec![
                ColumnValue::new("name", Value::text("bob")),
                ColumnValue::new("age", int(30)),
            ],
        };
        let statement = update_statement("users", &update).unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE \"users\" SET \"name\" = ?, \"age\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("bob".into()),
                SqlValue::Integer(30),
                SqlValue::Integer(1)
            ]
        );
    }

    #[test]
    fn test_update_statement_validation() {
        let no_changes = RecordUpdate {
            identity: by_id(1),
            changes: Vec::new(),
        };
        assert!(matches!(
            update_statement("users", &no_changes),
            Err(SqliteError::EditError(EditError::MissingRecordChanges))
        ));
        let no_identity = RecordUpdate {
            identity: RecordIdentity::Keys(Vec::new()),
            changes: vec![ColumnValue::new("name", Value::text("x"))],
        };
        assert!(matches!(
            update_statement("users", &no_identity),
            Err(SqliteError::EditError(EditError::MissingRecordIdentity))
        ));
    }

    #[test]
    fn test_delete_statement_by_rowid() {
        let delete = RecordDelete {
            identity: RecordIdentity::RowId(5),
        };
        let statement = delete_statement("t", &delete).unwrap();
        assert_eq!(statement.sql, "DELETE FROM \"t\" WHERE rowid = ?");
        assert_eq!(statement.params, vec![SqlValue::Integer(5)]);
    }

    #[test]
    fn test_build_statements_orders_and_skips_deleted_updates() {
        let changes = TableChanges {
            inserts: vec![RecordInsert {
                values: vec![ColumnValue::new("name", Value::text("dan"))],
                ..RecordInsert::default()
            }],
            updates: vec![
                RecordUpdate {
                    identity: by_id(1),
                    changes: vec![ColumnValue::new("name", Value::text("bob"))],
                },
                RecordUpdate {
                    identity: by_id(2),
                    changes: vec![ColumnValue::new("name", Value::text("gone"))],
                },
            ],
            deletes: vec![RecordDelete { identity: by_id(2) }],
        };
        let sql: Vec<String> = build_statements("users", &changes)
            .unwrap()
            .into_iter()
            .map(|s| s.sql)
            .collect();
        assert_eq!(
            sql,
            [
                "INSERT INTO \"users\" (\"name\") VALUES (?)",
                "UPDATE \"users\" SET \"name\" = ? WHERE \"id\" = ?",
                "DELETE FROM \"users\" WHERE \"id\" = ?",
            ]
        );
    }

    #[test]
    fn test_build_statements_validation() {
        let changes = TableChanges {
            deletes: vec![RecordDelete { identity: by_id(1) }],
            ..TableChanges::default()
        };
        assert!(matches!(
            build_statements("  ", &changes),
            Err(SqliteError::MissingTableName)
        ));
        assert!(matches!(
            build_statements("users", &TableChanges::default()),
            Err(SqliteError::EditError(EditError::MissingTableChanges))
        ));
    }
}
