//! SQL text helpers shared by listing, filtering and mutation.
//!
//! Identifiers are the only user-controlled text ever spliced into a
//! statement, and always through [`quote_identifier`]. Values are always bound.

use dbc_core::{EditError, RawValue, RecordIdentity, Value};
use rusqlite::types::Value as SqlValue;

/// A statement together with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Wraps an identifier in double quotes, doubling any embedded quote.
///
/// # Examples
///
/// ```
/// use dbc_sqlite::quote_identifier;
///
/// assert_eq!(quote_identifier("users"), r#""users""#);
/// assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Converts a staged value into the parameter bound for it.
///
/// Values without a typed payload (placeholders, unevaluated defaults) bind
/// their display text.
pub fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Typed { raw: Some(raw), .. } => match raw {
            RawValue::Integer(i) => SqlValue::Integer(*i),
            RawValue::Real(f) => SqlValue::Real(*f),
            RawValue::Blob(bytes) => SqlValue::Blob(bytes.clone()),
            RawValue::Text(text) => SqlValue::Text(text.clone()),
        },
        Value::Typed { text, raw: None } => SqlValue::Text(text.clone()),
    }
}

/// Builds `WHERE ...` for one row identity.
///
/// Keys are conjoined; a `NULL` key becomes `"k" IS NULL` with no parameter.
///
/// # Errors
///
/// Returns [`EditError::MissingRecordIdentity`] for an empty identity or a
/// blank key column name.
pub fn identity_clause(identity: &RecordIdentity) -> Result<(String, Vec<SqlValue>), EditError> {
    let keys = match identity {
        RecordIdentity::RowId(id) => {
            return Ok(("WHERE rowid = ?".to_string(), vec![SqlValue::Integer(*id)]));
        }
        RecordIdentity::Keys(keys) if keys.is_empty() => {
            return Err(EditError::MissingRecordIdentity);
        }
        RecordIdentity::Keys(keys) => keys,
    };

    let mut parts = Vec::with_capacity(keys.len());
    let mut params = Vec::with_capacity(keys.len());
    for key in keys {
        if key.column.trim().is_empty() {
            return Err(EditError::MissingRecordIdentity);
        }
        let column = quote_identifier(&key.column);
        if key.value.is_null() {
            parts.push(format!("{column} IS NULL"));
        } else {
            parts.push(format!("{column} = ?"));
            params.push(bind_value(&key.value));
        }
    }
    Ok((format!("WHERE {}", parts.join(" AND ")), params))
}
