//! Data model shared by the staging engine and its collaborators.
//!
//! Columns and rows arrive from the schema and record-listing layers; values,
//! identities, and [`TableChanges`] flow out to the SQL mutation engine. All
//! types serialize with [`serde`] so the pending batch can be shown to the user
//! before it is saved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EditError, Result};
use crate::identity;

/// Display sentinel used for SQL NULL in row listings.
pub const NULL_TEXT: &str = "NULL";

/// A table as listed by the schema collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
}

/// One column of a table schema snapshot.
///
/// Immutable once the snapshot is loaded; the whole schema is replaced when the
/// active table changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared type as written in the table definition (e.g. `"INTEGER"`,
    /// `"ENUM('a','b')"`). May be empty.
    pub declared_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// Raw SQL default text, exactly as reported by the database.
    pub default_value: Option<String>,
    pub auto_increment: bool,
}

impl Column {
    /// Creates a nullable, non-key column with no default.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbc_core::Column;
    ///
    /// let id = Column::new("id", "INTEGER").primary_key().auto_increment();
    /// assert!(id.primary_key && id.auto_increment && !id.nullable);
    ///
    /// let name = Column::new("name", "TEXT").not_null();
    /// assert!(!name.nullable);
    /// ```
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            primary_key: false,
            default_value: None,
            auto_increment: false,
        }
    }

    /// Marks the column as part of the primary key (and therefore NOT NULL).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the raw SQL default text.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Marks the column as an `AUTOINCREMENT` key.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Ordered column snapshot of one table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    /// Returns `true` if at least one column belongs to the primary key.
    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    /// Finds a column index by name (case-insensitive, like SQLite).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Typed payload carried by a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Integer(i64),
    Real(f64),
    Blob(Vec<u8>),
    Text(String),
}

/// A staged cell value.
///
/// `Typed` always keeps the text the user entered so it can be redisplayed,
/// even when the payload is opaque (blobs). `raw` is `None` only for
/// placeholders and unevaluated SQL defaults; those bind as their text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Typed {
        text: String,
        raw: Option<RawValue>,
    },
}

impl Value {
    /// A text value whose payload is the text itself.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Typed {
            raw: Some(RawValue::Text(text.clone())),
            text,
        }
    }

    /// A value with display text but no typed payload.
    pub fn untyped(text: impl Into<String>) -> Self {
        Self::Typed {
            text: text.into(),
            raw: None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Display form used in listings and for diffing against persisted rows.
    pub fn display(&self) -> &str {
        match self {
            Self::Null => NULL_TEXT,
            Self::Typed { text, .. } => text,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// A column name paired with a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub column: String,
    pub value: Value,
}

impl ColumnValue {
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Addresses exactly one database row.
///
/// Never empty: [`RecordIdentity::keys`] refuses an empty key list. Identities
/// compare through [`signature`](Self::signature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordIdentity {
    RowId(i64),
    Keys(Vec<ColumnValue>),
}

impl RecordIdentity {
    /// Builds a primary-key identity.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::MissingRecordIdentity`] if `keys` is empty.
    pub fn keys(keys: Vec<ColumnValue>) -> Result<Self> {
        if keys.is_empty() {
            return Err(EditError::MissingRecordIdentity);
        }
        Ok(Self::Keys(keys))
    }

    /// Returns `true` if the identity could not address any row.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::RowId(_) => false,
            Self::Keys(keys) => keys.is_empty(),
        }
    }

    /// Deterministic string form, `"col=text|col=text"` or `"rowid=N"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbc_core::{ColumnValue, RecordIdentity, Value};
    ///
    /// let identity = RecordIdentity::keys(vec![
    ///     ColumnValue::new("user_id", Value::text("7")),
    ///     ColumnValue::new("group_id", Value::Null),
    /// ])
    /// .unwrap();
    /// assert_eq!(identity.signature(), "user_id=7|group_id=NULL");
    /// assert_eq!(RecordIdentity::RowId(3).signature(), "rowid=3");
    /// ```
    pub fn signature(&self) -> String {
        match self {
            Self::RowId(id) => identity::signature([("rowid", id.to_string().as_str())]),
            Self::Keys(keys) => identity::signature(
                keys.iter()
                    .map(|key| (key.column.as_str(), key.value.display())),
            ),
        }
    }
}

/// One row as shown to the user: display strings in column order, with
/// [`NULL_TEXT`] for SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordRow {
    pub values: Vec<String>,
}

impl RecordRow {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Display value at `index`, if the row has that many columns.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

/// A page of rows plus whether more rows follow it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordPage {
    pub rows: Vec<RecordRow>,
    pub has_more: bool,
}

/// A filter operator from the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operator {
    pub name: &'static str,
    pub sql: &'static str,
    pub requires_value: bool,
}

/// A display filter: `column OPERATOR [value]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    pub value: String,
}

/// A planned insert.
///
/// `explicit_auto_values` holds auto-increment columns the user forced a value
/// for; they are bound like any other value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordInsert {
    pub values: Vec<ColumnValue>,
    pub explicit_auto_values: Vec<ColumnValue>,
}

/// A planned update of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub identity: RecordIdentity,
    pub changes: Vec<ColumnValue>,
}

/// A planned delete of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDelete {
    pub identity: RecordIdentity,
}

/// The batch handed to the mutation engine. Executed as inserts, then updates,
/// then deletes, inside one transaction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableChanges {
    pub inserts: Vec<RecordInsert>,
    pub updates: Vec<RecordUpdate>,
    pub deletes: Vec<RecordDelete>,
}

impl TableChanges {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of row-level operations in the batch.
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}
