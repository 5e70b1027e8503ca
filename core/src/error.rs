//! Error types for staging and planning row edits.
//!
//! Every failure the core can report while parsing user input, resolving row
//! identities, staging edits, or planning a save is a variant of
//! [`EditError`]. None of them are fatal: callers show the `Display` text and
//! keep the staged state as it was.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The value kind a failed parse was attempted as.
///
/// Used as the reason suffix of [`EditError::InvalidValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Boolean,
    Integer,
    Real,
    Numeric,
    Blob,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Numeric => "numeric",
            Self::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// Errors raised by the value codec, identity resolver, staged change store,
/// and mutation planner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// NULL was requested for a column that does not accept it.
    #[error("null value not allowed")]
    NullNotAllowed,

    /// User text could not be parsed as the column's value kind.
    #[error("invalid {0} value")]
    InvalidValue(ValueKind),

    /// A row identity has neither a rowid nor any key columns.
    #[error("record identity is required")]
    MissingRecordIdentity,

    /// An update carries no column changes.
    #[error("record changes are required")]
    MissingRecordChanges,

    /// A save was requested with nothing staged.
    #[error("table changes are required")]
    MissingTableChanges,

    /// A pending insert has no usable values, or a required column is empty.
    #[error("insert values are required")]
    MissingInsertValues,

    /// A delete has neither a rowid nor any key columns.
    #[error("delete identity is required")]
    MissingDeleteIdentity,

    /// The table exposes no primary key, so rows cannot be addressed.
    #[error("table has no primary key")]
    NoPrimaryKey,

    /// Column index does not exist in the active schema.
    #[error("column index {0} out of range")]
    ColumnOutOfRange(usize),

    /// Pending insert index does not exist.
    #[error("pending insert index {0} out of range")]
    InsertOutOfRange(usize),
}

/// Convenience alias for results with [`EditError`].
pub type Result<T> = std::result::Result<T, EditError>;
