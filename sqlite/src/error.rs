//! Error types for SQLite engine operations.
//!
//! Covers opening a database file, reading its schema and rows, building
//! filter clauses, and applying a batch of row changes.

use std::path::PathBuf;

use dbc_core::EditError;
use thiserror::Error;

/// Errors that can occur while talking to a SQLite database.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A mutation statement failed; the transaction was rolled back.
    #[error("{source} (statement: {statement})")]
    StatementError {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The change batch was malformed.
    #[error(transparent)]
    EditError(#[from] EditError),

    /// Filesystem failure while checking the database path.
    #[error("check database path: {0}")]
    IoError(#[from] std::io::Error),

    /// No table name was given for a mutation.
    #[error("table name is required")]
    MissingTableName,

    /// A filter was given without a column.
    #[error("filter column is required")]
    MissingFilterColumn,

    /// The operator is not on the filter allow-list.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// The database file does not exist.
    #[error("database file does not exist: {}", .0.display())]
    DatabaseNotFound(PathBuf),

    /// The database path points to a directory.
    #[error("database path points to a directory: {}", .0.display())]
    NotAFile(PathBuf),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
