//! The SQLite engine: one connection to one database file.
//!
//! Provides [`SqliteEngine`] for opening a database, listing its tables,
//! reading a table's column snapshot, and paging through rows with an
//! optional display filter. Row mutations live in the `mutation` module.
//!
//! # Example
//!
//! ```no_run
//! use dbc_sqlite::SqliteEngine;
//!
//! let engine = SqliteEngine::open("app.db").unwrap();
//! for table in engine.list_tables().unwrap() {
//!     let schema = engine.table_schema(&table.name).unwrap();
//!     println!("{} ({} columns)", table.name, schema.columns.len());
//! }
//! ```

use std::path::Path;

use dbc_core::{Column, Filter, NULL_TEXT, Operator, RecordPage, RecordRow, Table, TableSchema};
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::debug;

use crate::error::{Result, SqliteError};
use crate::filter;
use crate::sql::quote_identifier;

/// A connection to one SQLite database file.
///
/// Saves take `&mut self`, so only one transaction can be in flight.
pub struct SqliteEngine {
    pub(crate) conn: Connection,
}

impl SqliteEngine {
    /// Wraps an already-open connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens an existing database file and checks that it answers queries.
    ///
    /// The file is never created: a missing path is an error.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::DatabaseNotFound`], [`SqliteError::NotAFile`],
    /// or the failure of opening or pinging the database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => SqliteError::DatabaseNotFound(path.to_path_buf()),
            _ => SqliteError::IoError(err),
        })?;
        if metadata.is_dir() {
            return Err(SqliteError::NotAFile(path.to_path_buf()));
        }

        let engine = Self::new(Connection::open(path)?);
        engine.ping()?;
        debug!(path = %path.display(), "Opened database");
        Ok(engine)
    }

    /// Opens, pings and closes a database file.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), plus a failure to close the connection.
    pub fn check_connection(path: impl AsRef<Path>) -> Result<()> {
        let engine = Self::open(path)?;
        engine.conn.close().map_err(|(_, err)| SqliteError::DatabaseError(err))
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ping(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Lists user tables sorted by name; SQLite's internal tables are skipped.
    pub fn list_tables(&self) -> Result<Vec<Table>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let mut tables: Vec<Table> = stmt
            .query_map([], |row| Ok(Table { name: row.get(0)? }))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    /// Reads the column snapshot of a table.
    ///
    /// Defaults are kept as the raw SQL text SQLite reports. A primary-key
    /// column is flagged auto-increment when the table definition declares it
    /// `PRIMARY KEY ... AUTOINCREMENT`.
    pub fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let definition = self.table_definition(table)?.unwrap_or_default();

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared_type: String = row.get(2)?;
                let not_null: i64 = row.get(3)?;
                let default_value: Option<String> = row.get(4)?;
                let pk: i64 = row.get(5)?;
                let auto_increment = pk > 0 && column_has_auto_increment(&definition, &name);
                Ok(Column {
                    name,
                    declared_type,
                    nullable: not_null == 0,
                    primary_key: pk > 0,
                    default_value,
                    auto_increment,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(table, columns = columns.len(), "Loaded table schema");
        Ok(TableSchema::new(table, columns))
    }

    fn table_definition(&self, table: &str) -> Result<Option<String>> {
        let definition = self
            .conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(definition.flatten())
    }

    /// Fetches one page of rows as display strings.
    ///
    /// `limit + 1` rows are requested so the page knows whether more follow. A
    /// zero `limit` returns an empty page without querying.
    ///
    /// # Errors
    ///
    /// Returns filter validation errors or any database failure.
    pub fn list_records(
        &self,
        table: &str,
        offset: usize,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<RecordPage> {
        if limit == 0 {
            return Ok(RecordPage::default());
        }

        let (clause, mut params) = filter::build_filter_clause(filter)?;
        let mut sql = format!("SELECT * FROM {}", quote_identifier(table));
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(&clause);
        }
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(SqlValue::Integer(to_i64(limit.saturating_add(1))));
        params.push(SqlValue::Integer(to_i64(offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(display_value))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map(|values| RecordRow { values })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let has_more = rows.len() > limit;
        rows.truncate(limit);
        Ok(RecordPage { rows, has_more })
    }

    /// Filter operators offered for a column type.
    pub fn operators(&self, declared_type: &str) -> &'static [Operator] {
        filter::operators_for_type(declared_type)
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Renders a fetched value the way listings show it.
fn display_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => NULL_TEXT.to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        // `0x` hex parses back to the same bytes.
        ValueRef::Blob(bytes) => format!("0x{}", hex::encode_upper(bytes)),
    }
}

/// Heuristic: the column is declared `PRIMARY KEY ... AUTOINCREMENT` in the
/// table's `CREATE TABLE` text.
///
/// The column name must appear as a whole identifier (optionally quoted with
/// `"`, `` ` `` or `[]`) at the start of a column definition, so `id` does not
/// match inside `user_id`.
fn column_has_auto_increment(definition: &str, column: &str) -> bool {
    if definition.trim().is_empty() || !definition.to_ascii_uppercase().contains("AUTOINCREMENT") {
        return false;
    }
    let pattern = format!(
        r#"(?is)(?:^|[\s,(])["`\[]?{}["`\]]?\s+[^,]*?PRIMARY\s+KEY[^,]*AUTOINCREMENT"#,
        regex::escape(column)
    );
    Regex::new(&pattern).is_ok_and(|re| re.is_match(definition))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(setup: &str) -> SqliteEngine {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(setup).unwrap();
        SqliteEngine::new(conn)
    }

    #[test]
    fn test_auto_increment_heuristic() {
        let sql = "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER)";
        assert!(column_has_auto_increment(sql, "id"));
        assert!(column_has_auto_increment(sql, "ID"));
        assert!(!column_has_auto_increment(sql, "user_id"));

        let quoted = "CREATE TABLE t (\"my id\" INTEGER PRIMARY KEY AUTOINCREMENT)";
        assert!(column_has_auto_increment(quoted, "my id"));

        let plain = "CREATE TABLE t (id INTEGER PRIMARY KEY)";
        assert!(!column_has_auto_increment(plain, "id"));
        assert!(!column_has_auto_increment("", "id"));
    }

    #[test]
    fn test_auto_increment_ignores_other_columns_keyword() {
        let sql = "CREATE TABLE t (\n  user_id INTEGER PRIMARY KEY AUTOINCREMENT,\n  id TEXT\n)";
        assert!(!column_has_auto_increment(sql, "id"));
    }

    #[test]
    fn test_table_schema_maps_defaults_and_auto_increment() {
        let engine = engine(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL DEFAULT 'guest',
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );",
        );
        let schema = engine.table_schema("users").unwrap();
        assert_eq!(schema.table, "users");
        assert_eq!(schema.columns.len(), 3);

        let id = &schema.columns[0];
        assert!(id.primary_key && id.auto_increment);
        assert_eq!(id.default_value, None);

        let name = &schema.columns[1];
        assert!(!name.nullable);
        assert_eq!(name.default_value.as_deref(), Some("'guest'"));

        let created = &schema.columns[2];
        assert!(created.nullable && !created.primary_key && !created.auto_increment);
        assert_eq!(created.default_value.as_deref(), Some("CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_list_tables_sorted_without_internal_tables() {
        let engine = engine(
            "CREATE TABLE zebra (id INTEGER PRIMARY KEY AUTOINCREMENT);
             CREATE TABLE apple (id INTEGER PRIMARY KEY);
             INSERT INTO zebra DEFAULT VALUES;",
        );
        let names: Vec<String> = engine
            .list_tables()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        // sqlite_sequence exists because of AUTOINCREMENT.
        assert_eq!(names, ["apple", "zebra"]);
    }

    #[test]
    fn test_list_records_quoted_table_name() {
        let engine = engine(
            "CREATE TABLE \"audit\"\"log\" (id INTEGER PRIMARY KEY, note TEXT NOT NULL);
             INSERT INTO \"audit\"\"log\" (id, note) VALUES (1, 'entry');",
        );
        let page = engine.list_records("audit\"log", 0, 10, None).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert!(!page.has_more);
        assert_eq!(page.rows[0].get(1), Some("entry"));
    }

    #[test]
    fn test_list_records_renders_display_values() {
        let engine = engine(
            "CREATE TABLE v (i INTEGER, r REAL, t TEXT, b BLOB, n TEXT);
             INSERT INTO v VALUES (7, 2.5, 'hi', x'6869', NULL);",
        );
        let page = engine.list_records("v", 0, 5, None).unwrap();
        assert_eq!(page.rows[0].values, ["7", "2.5", "hi", "0x6869", "NULL"]);
    }

    #[test]
    fn test_list_records_zero_limit() {
        let engine = engine("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1);");
        let page = engine.list_records("t", 0, 0, None).unwrap();
        assert!(page.rows.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn test_operators_are_the_allow_list() {
        let engine = engine("");
        assert_eq!(engine.operators("TEXT").len(), filter::OPERATORS.len());
    }
}
