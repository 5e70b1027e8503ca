//! Identity resolution: ties a displayed row to the database row it came from.
//!
//! Rows are addressed by their primary-key values, never by screen position,
//! so staged edits survive paging, filtering and reloads. The signature
//! formatter in this module is the single place identity strings are built;
//! both the staged change store and the planner key their maps with it.

use crate::codec;
use crate::error::{EditError, Result};
use crate::types::{Column, ColumnValue, NULL_TEXT, RecordIdentity, RecordRow};

/// A primary-key column together with its position in the row.
#[derive(Debug, Clone, Copy)]
pub struct KeyColumn<'a> {
    pub index: usize,
    pub column: &'a Column,
}

/// Returns the primary-key columns of a schema, in column order.
pub fn key_columns(columns: &[Column]) -> Vec<KeyColumn<'_>> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.primary_key)
        .map(|(index, column)| KeyColumn { index, column })
        .collect()
}

/// Joins `name=value` pairs with `|`.
pub(crate) fn signature<'a>(parts: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    parts
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Builds the signature of a displayed row from its primary-key display values.
///
/// # Errors
///
/// Returns [`EditError::NoPrimaryKey`] if the schema has no primary-key
/// column, or [`EditError::MissingRecordIdentity`] if the row is missing a key
/// value.
///
/// # Examples
///
/// ```
/// use dbc_core::{Column, RecordRow, identity};
///
/// let columns = vec![
///     Column::new("user_id", "INTEGER").primary_key(),
///     Column::new("group_id", "INTEGER").primary_key(),
///     Column::new("role", "TEXT"),
/// ];
/// let row = RecordRow::new(["1", "20", "admin"]);
/// assert_eq!(identity::row_signature(&row, &columns).unwrap(), "user_id=1|group_id=20");
/// ```
pub fn row_signature(row: &RecordRow, columns: &[Column]) -> Result<String> {
    let keys = key_columns(columns);
    if keys.is_empty() {
        return Err(EditError::NoPrimaryKey);
    }
    let mut parts = Vec::with_capacity(keys.len());
    for key in &keys {
        let value = row.get(key.index).ok_or(EditError::MissingRecordIdentity)?;
        parts.push((key.column.name.as_str(), value));
    }
    Ok(signature(parts))
}

/// Builds a typed identity for a displayed row.
///
/// Each key's display text is parsed back into a typed value. Key columns are
/// never treated as nullable: a `NULL` key fails with
/// [`EditError::NullNotAllowed`] instead of producing an unsafe lookup.
///
/// # Errors
///
/// Returns [`EditError::NoPrimaryKey`], [`EditError::MissingRecordIdentity`],
/// or any parse failure for a key value.
pub fn build_identity(row: &RecordRow, columns: &[Column]) -> Result<RecordIdentity> {
    let keys = key_columns(columns);
    if keys.is_empty() {
        return Err(EditError::NoPrimaryKey);
    }
    let mut values = Vec::with_capacity(keys.len());
    for key in &keys {
        let text = row.get(key.index).ok_or(EditError::MissingRecordIdentity)?;
        let is_null = text.eq_ignore_ascii_case(NULL_TEXT);
        let value = codec::parse_value(&key.column.declared_type, text, is_null, false)?;
        values.push(ColumnValue::new(key.column.name.clone(), value));
    }
    RecordIdentity::keys(values)
}
