//! Staged row editing for SQLite tables.
//!
//! This crate holds everything between "the user typed something into a cell"
//! and "here is the batch of statements to run", without any I/O:
//!
//! - [`codec`]: declared column type → affinity, and user text → typed
//!   [`Value`].
//! - [`identity`]: primary-key identities and the signature strings that key
//!   staged state.
//! - [`StagedChanges`]: pending inserts, updates and deletes with undo/redo.
//! - [`plan`]: turns the staged changes into [`TableChanges`].
//! - [`save`]: plans, hands the batch to a [`ChangeWriter`], and clears the
//!   store once it commits.
//!
//! # Example
//!
//! ```
//! use dbc_core::*;
//!
//! let schema = TableSchema::new(
//!     "users",
//!     vec![
//!         Column::new("id", "INTEGER").primary_key().auto_increment(),
//!         Column::new("name", "TEXT").not_null(),
//!     ],
//! );
//! let mut staged = StagedChanges::new(schema);
//!
//! staged.add_insert();
//! let name = codec::parse_value("TEXT", "dan", false, false).unwrap();
//! staged.stage_cell_edit(RowRef::Insert(0), 1, name).unwrap();
//!
//! let alice = RecordRow::new(["2", "alice"]);
//! staged.toggle_delete(RowRef::Persisted(&alice)).unwrap();
//!
//! let changes = plan(&staged).unwrap();
//! assert_eq!(changes.inserts[0].values, vec![ColumnValue::new("name", Value::text("dan"))]);
//! assert_eq!(changes.deletes[0].identity.signature(), "id=2");
//! ```

pub mod codec;
mod error;
mod history;
pub mod identity;
mod planner;
mod save;
mod staging;
mod types;

pub use error::{EditError, Result, ValueKind};
pub use history::DEFAULT_HISTORY_DEPTH;
pub use planner::plan;
pub use save::{ChangeWriter, SaveError, save};
pub use staging::{InsertId, PendingDelete, PendingInsert, PendingUpdate, RowRef, StagedChanges};
pub use types::*;
