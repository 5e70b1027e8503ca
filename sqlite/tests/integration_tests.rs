//! Integration tests for the dbc-sqlite crate.

use dbc_core::{
    ColumnValue, EditError, Filter, RawValue, RecordDelete, RecordIdentity, RecordInsert,
    RecordUpdate, RowRef, SaveError, StagedChanges, TableChanges, Value, codec, save,
};
use dbc_sqlite::{SqliteEngine, SqliteError, find_operator};
use rusqlite::Connection;
use tempfile::TempDir;

/// Creates a database file from `setup` and opens it through the engine.
fn setup_engine(setup: &str) -> (TempDir, SqliteEngine) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(setup).unwrap();
    conn.close().unwrap();
    let engine = SqliteEngine::open(&path).unwrap();
    (dir, engine)
}

fn int(i: i64) -> Value {
    Value::Typed {
        text: i.to_string(),
        raw: Some(RawValue::Integer(i)),
    }
}

fn by_id(id: i64) -> RecordIdentity {
    RecordIdentity::Keys(vec![ColumnValue::new("id", int(id))])
}

fn count(engine: &SqliteEngine, table: &str) -> i64 {
    engine
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

fn name_of(engine: &SqliteEngine, id: i64) -> Option<String> {
    engine
        .connection()
        .query_row("SELECT name FROM users WHERE id = ?1", [id], |row| row.get(0))
        .ok()
}

fn all_users(engine: &SqliteEngine) -> Vec<(i64, String)> {
    let mut stmt = engine
        .connection()
        .prepare("SELECT id, name FROM users ORDER BY id")
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap()
}

const USERS: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        active BOOLEAN NOT NULL,
        score REAL NOT NULL,
        note TEXT
    );
    INSERT INTO users (id, name, active, score, note)
    VALUES (1, 'alice', 1, 1.25, 'hello'),
           (2, 'carol', 1, 2.10, 'keep');
";

// ----------------------------------------------------------------------------
// Opening
// ----------------------------------------------------------------------------

#[test]
fn test_open_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.db");
    assert!(matches!(
        SqliteEngine::open(&path),
        Err(SqliteError::DatabaseNotFound(p)) if p == path
    ));
    // The file must not have been created as a side effect.
    assert!(!path.exists());
}

#[test]
fn test_open_directory() {
    let dir = TempDir::new().unwrap();
    let err = SqliteEngine::open(dir.path()).err().unwrap();
    assert!(matches!(err, SqliteError::NotAFile(_)));
    assert!(err.to_string().starts_with("database path points to a directory"));
}

#[test]
fn test_check_connection() {
    let (dir, _engine) = setup_engine("CREATE TABLE t (id INTEGER PRIMARY KEY);");
    assert!(SqliteEngine::check_connection(dir.path().join("test.db")).is_ok());
    assert!(SqliteEngine::check_connection(dir.path().join("nope.db")).is_err());
}

// ----------------------------------------------------------------------------
// Mutation engine
// ----------------------------------------------------------------------------

#[test]
fn test_apply_insert_update_delete_in_one_transaction() {
    let (_dir, mut engine) = setup_engine(USERS);
    let changes = TableChanges {
        inserts: vec![RecordInsert {
            values: vec![
                ColumnValue::new("name", Value::text("dan")),
                ColumnValue::new(
                    "active",
                    Value::Typed {
                        text: "true".into(),
                        raw: Some(RawValue::Integer(1)),
                    },
                ),
                ColumnValue::new(
                    "score",
                    Value::Typed {
                        text: "4.5".into(),
                        raw: Some(RawValue::Real(4.5)),
                    },
                ),
                ColumnValue::new("note", Value::Null),
            ],
            explicit_auto_values: Vec::new(),
        }],
        updates: vec![RecordUpdate {
            identity: by_id(1),
            changes: vec![ColumnValue::new("name", Value::text("bob"))],
        }],
        deletes: vec![RecordDelete { identity: by_id(2) }],
    };

    engine.apply_changes("users", &changes).unwrap();

    assert_eq!(count(&engine, "users"), 2);
    assert_eq!(name_of(&engine, 1).as_deref(), Some("bob"));
    assert_eq!(name_of(&engine, 2), None);
    let (name, score, note): (String, f64, Option<String>) = engine
        .connection()
        .query_row(
            "SELECT name, score, note FROM users WHERE id = 3",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "dan");
    assert_eq!(score, 4.5);
    assert_eq!(note, None);
}

#[test]
fn test_failing_second_statement_rolls_back() {
    let (_dir, mut engine) = setup_engine(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO users (id, name) VALUES (1, 'alice'), (3, 'carol');",
    );
    let changes = TableChanges {
        inserts: vec![RecordInsert {
            values: vec![
                ColumnValue::new("id", int(2)),
                ColumnValue::new("name", Value::text("bob")),
            ],
            ..RecordInsert::default()
        }],
        updates: vec![RecordUpdate {
            identity: by_id(1),
            changes: vec![ColumnValue::new("missing_column", Value::text("oops"))],
        }],
        deletes: vec![RecordDelete { identity: by_id(3) }],
    };

    let err = engine.apply_changes("users", &changes).unwrap_err();
    let SqliteError::StatementError { statement, .. } = &err else {
        panic!("expected statement error, got {err}");
    };
    assert_eq!(
        statement,
        "UPDATE \"users\" SET \"missing_column\" = ? WHERE \"id\" = ?"
    );
    assert!(err.to_string().contains("missing_column"));

    // The insert before the failure is undone and the delete after it never runs.
    assert_eq!(
        all_users(&engine),
        [(1, "alice".to_string()), (3, "carol".to_string())]
    );
}

#[test]
fn test_composite_key_delete_spares_siblings() {
    let (_dir, mut engine) = setup_engine(
        "CREATE TABLE memberships (
            user_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            PRIMARY KEY (user_id, group_id)
        );
        INSERT INTO memberships (user_id, group_id, role)
        VALUES (1, 1, 'owner'), (1, 2, 'viewer');",
    );
    let changes = TableChanges {
        deletes: vec![RecordDelete {
            identity: RecordIdentity::Keys(vec![
                ColumnValue::new("user_id", int(1)),
                ColumnValue::new("group_id", int(2)),
            ]),
        }],
        ..TableChanges::default()
    };

    engine.apply_changes("memberships", &changes).unwrap();

    assert_eq!(count(&engine, "memberships"), 1);
    let role: String = engine
        .connection()
        .query_row(
            "SELECT role FROM memberships WHERE user_id = 1 AND group_id = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(role, "owner");
}

#[test]
fn test_insert_with_explicit_auto_increment_value() {
    let (_dir, mut engine) = setup_engine(
        "CREATE TABLE events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT 'anonymous',
            level INTEGER NOT NULL DEFAULT 5
        );",
    );
    let changes = TableChanges {
        inserts: vec![
            RecordInsert {
                values: vec![ColumnValue::new("level", int(5))],
                ..RecordInsert::default()
            },
            RecordInsert {
                values: vec![
                    ColumnValue::new("name", Value::text("manual")),
                    ColumnValue::new("level", int(7)),
                ],
                explicit_auto_values: vec![ColumnValue::new("id", int(10))],
            },
        ],
        ..TableChanges::default()
    };

    engine.apply_changes("events", &changes).unwrap();

    let (name, level): (String, i64) = engine
        .connection()
        .query_row("SELECT name, level FROM events WHERE id = 1", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!((name.as_str(), level), ("anonymous", 5));
    let manual: String = engine
        .connection()
        .query_row("SELECT name FROM events WHERE id = 10", [], |row| row.get(0))
        .unwrap();
    assert_eq!(manual, "manual");
}

#[test]
fn test_update_of_deleted_row_is_skipped() {
    let (_dir, mut engine) = setup_engine(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO users (id, name) VALUES (1, 'alice');",
    );
    let changes = TableChanges {
        updates: vec![RecordUpdate {
            identity: by_id(1),
            changes: vec![ColumnValue::new("missing_column", Value::text("x"))],
        }],
        deletes: vec![RecordDelete { identity: by_id(1) }],
        ..TableChanges::default()
    };

    engine.apply_changes("users", &changes).unwrap();
    assert_eq!(count(&engine, "users"), 0);
}

#[test]
fn test_malformed_batch_never_starts_transaction() {
    let (_dir, mut engine) = setup_engine(USERS);
    let changes = TableChanges {
        deletes: vec![RecordDelete { identity: by_id(1) }],
        updates: vec![RecordUpdate {
            identity: by_id(2),
            changes: Vec::new(),
        }],
        ..TableChanges::default()
    };
    assert!(matches!(
        engine.apply_changes("users", &changes),
        Err(SqliteError::EditError(EditError::MissingRecordChanges))
    ));
    assert!(matches!(
        engine.apply_changes(" ", &changes),
        Err(SqliteError::MissingTableName)
    ));
    assert_eq!(count(&engine, "users"), 2);
}

// ----------------------------------------------------------------------------
// Staging through to disk
// ----------------------------------------------------------------------------

#[test]
fn test_users_scenario_end_to_end() {
    let (_dir, mut engine) = setup_engine(USERS);
    let schema = engine.table_schema("users").unwrap();
    assert!(schema.columns[0].auto_increment);
    let page = engine.list_records("users", 0, 10, None).unwrap();
    assert_eq!(page.rows.len(), 2);

    let mut staged = StagedChanges::new(schema);
    staged.add_insert();
    for (column, text) in [(1, "dan"), (2, "true"), (3, "4.5")] {
        let declared = staged.columns()[column].declared_type.clone();
        let value = codec::parse_value(&declared, text, false, false).unwrap();
        staged
            .stage_cell_edit(RowRef::Insert(0), column, value)
            .unwrap();
    }
    staged
        .stage_cell_edit(RowRef::Persisted(&page.rows[0]), 1, Value::text("bob"))
        .unwrap();
    staged.toggle_delete(RowRef::Persisted(&page.rows[1])).unwrap();

    assert_eq!(save(&mut staged, "users", &mut engine).unwrap(), 3);
    assert!(!staged.has_dirty_edits());

    let page = engine.list_records("users", 0, 10, None).unwrap();
    let rows: Vec<Vec<String>> = page.rows.into_iter().map(|r| r.values).collect();
    assert_eq!(
        rows,
        vec![
            vec!["1", "bob", "1", "1.25", "hello"],
            vec!["3", "dan", "1", "4.5", "NULL"],
        ]
    );
}

#[test]
fn test_failed_save_keeps_staged_changes() {
    let (_dir, mut engine) = setup_engine(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
         INSERT INTO users (id, name) VALUES (1, 'alice'), (2, 'bob');",
    );
    let schema = engine.table_schema("users").unwrap();
    let page = engine.list_records("users", 0, 10, None).unwrap();

    let mut staged = StagedChanges::new(schema);
    staged
        .stage_cell_edit(RowRef::Persisted(&page.rows[1]), 1, Value::text("alice"))
        .unwrap();

    let err = save(&mut staged, "users", &mut engine).unwrap_err();
    assert!(matches!(
        err,
        SaveError::Apply(SqliteError::StatementError { .. })
    ));
    assert_eq!(staged.dirty_count(), 1);
    assert_eq!(name_of(&engine, 2).as_deref(), Some("bob"));
}

#[test]
fn test_expression_default_left_to_database() {
    let (_dir, mut engine) = setup_engine(
        "CREATE TABLE notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    );
    let schema = engine.table_schema("notes").unwrap();
    let mut staged = StagedChanges::new(schema);
    staged.add_insert();
    staged
        .stage_cell_edit(RowRef::Insert(0), 1, Value::text("first"))
        .unwrap();

    save(&mut staged, "notes", &mut engine).unwrap();

    let created: String = engine
        .connection()
        .query_row("SELECT created_at FROM notes WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_ne!(created, "CURRENT_TIMESTAMP");
    assert!(created.starts_with("20"));
}

#[test]
fn test_blob_primary_key_rows_round_trip() {
    let (_dir, mut engine) = setup_engine(
        "CREATE TABLE t (k BLOB PRIMARY KEY, v TEXT);
         INSERT INTO t (k, v) VALUES (x'FF00', 'a'), (x'FF01', 'b');",
    );
    let schema = engine.table_schema("t").unwrap();
    let page = engine.list_records("t", 0, 10, None).unwrap();
    let row = |key: &str| {
        page.rows
            .iter()
            .find(|r| r.values[0] == key)
            .unwrap_or_else(|| panic!("no row keyed {key}"))
    };

    let mut staged = StagedChanges::new(schema);
    assert!(staged.toggle_delete(RowRef::Persisted(row("0xFF00"))).unwrap());
    staged
        .stage_cell_edit(RowRef::Persisted(row("0xFF01")), 1, Value::text("z"))
        .unwrap();
    assert_eq!(save(&mut staged, "t", &mut engine).unwrap(), 2);

    let rows: Vec<(Vec<u8>, String)> = engine
        .connection()
        .prepare("SELECT k, v FROM t")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(rows, [(vec![0xFF, 0x01], "z".to_string())]);
}

// ----------------------------------------------------------------------------
// Listing and filters
// ----------------------------------------------------------------------------

#[test]
fn test_list_records_filter_and_pagination() {
    let (_dir, engine) = setup_engine(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO users (id, name) VALUES (1, 'alice'), (2, 'bob'), (3, 'alice');",
    );
    let filter = Filter {
        column: "name".into(),
        operator: find_operator("=").unwrap(),
        value: "alice".into(),
    };

    let first = engine.list_records("users", 0, 1, Some(&filter)).unwrap();
    assert_eq!(first.rows.len(), 1);
    assert!(first.has_more);
    assert_eq!(first.rows[0].get(0), Some("1"));

    let second = engine.list_records("users", 1, 1, Some(&filter)).unwrap();
    assert_eq!(second.rows[0].get(0), Some("3"));
    assert!(!second.has_more);

    let nulls = Filter {
        column: "name".into(),
        operator: find_operator("IS NULL").unwrap(),
        value: String::new(),
    };
    assert!(engine.list_records("users", 0, 10, Some(&nulls)).unwrap().rows.is_empty());
}

#[test]
fn test_list_records_rejects_blank_filter_column() {
    let (_dir, engine) = setup_engine("CREATE TABLE t (id INTEGER PRIMARY KEY);");
    let filter = Filter {
        column: String::new(),
        operator: find_operator("=").unwrap(),
        value: "1".into(),
    };
    assert!(matches!(
        engine.list_records("t", 0, 10, Some(&filter)),
        Err(SqliteError::MissingFilterColumn)
    ));
}
