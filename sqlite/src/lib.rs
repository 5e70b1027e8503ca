//! SQLite backend for the dbc row editor.
//!
//! [`SqliteEngine`] wraps one [`rusqlite::Connection`] and provides everything
//! the editor needs from a database file:
//!
//! - **Introspection**: [`list_tables`](SqliteEngine::list_tables) and
//!   [`table_schema`](SqliteEngine::table_schema).
//! - **Listing**: [`list_records`](SqliteEngine::list_records), paged, with an
//!   optional display [`Filter`](dbc_core::Filter) checked against the
//!   [`OPERATORS`] allow-list.
//! - **Mutation**: [`apply_changes`](SqliteEngine::apply_changes) runs a
//!   planned [`TableChanges`](dbc_core::TableChanges) batch in one
//!   transaction. The engine implements [`dbc_core::ChangeWriter`], so it can
//!   be handed straight to [`dbc_core::save`].
//!
//! # Quick start
//!
//! ```no_run
//! use dbc_core::{RecordPage, RowRef, StagedChanges, Value};
//! use dbc_sqlite::SqliteEngine;
//!
//! let mut engine = SqliteEngine::open("app.db").unwrap();
//! let schema = engine.table_schema("users").unwrap();
//! let page: RecordPage = engine.list_records("users", 0, 20, None).unwrap();
//!
//! let mut staged = StagedChanges::new(schema);
//! staged
//!     .stage_cell_edit(RowRef::Persisted(&page.rows[0]), 1, Value::text("bob"))
//!     .unwrap();
//! dbc_core::save(&mut staged, "users", &mut engine).unwrap();
//! ```
//!
//! Identifiers are always quoted with [`quote_identifier`]; values are always
//! bound as parameters.

mod engine;
mod error;
mod filter;
mod mutation;
mod sql;

pub use engine::SqliteEngine;
pub use error::{Result, SqliteError};
pub use filter::{OPERATORS, build_filter_clause, find_operator, operators_for_type};
pub use mutation::{build_statements, delete_statement, insert_statement, update_statement};
pub use sql::{Statement, bind_value, identity_clause, quote_identifier};
