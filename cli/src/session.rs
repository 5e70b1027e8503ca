//! The interactive editing session.
//!
//! A [`Session`] owns one open database and at most one active table. Each
//! input line is one command; its output (or its error) is written to the
//! given writer and the session carries on. Row edits are staged in a
//! [`StagedChanges`] store and only reach the database on `save`.

use std::io::Write;

use dbc_core::{
    EditError, Filter, Operator, RecordPage, RowRef, StagedChanges, TableSchema, Value, codec,
};
use dbc_sqlite::{SqliteEngine, find_operator};
use tracing::debug;

/// Rows fetched per page unless `--page-size` says otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 20;

const MAX_CELL_WIDTH: usize = 24;
const NO_TABLE: &str = "no table selected (try `use <table>`)";

const HELP: &[&str] = &[
    "Commands:",
    "  tables                         list tables",
    "  use <table>                    open a table (use! discards staged changes)",
    "  schema                         show the active table's columns",
    "  rows | next | prev             show the current, next or previous page",
    "  filter <col> <op> [value]      filter the listing (`filter clear` removes it)",
    "  operators <col>                list filter operators for a column",
    "  insert                         stage a new row (+1 is the newest)",
    "  set <row> <col> <text>         stage a cell value",
    "  null <row> <col>               stage NULL for a cell",
    "  delete <row>                   toggle deletion of a row, or drop a new row",
    "  undo | redo                    step through staged edits",
    "  changes [--json]               show the planned batch",
    "  save                           write staged changes in one transaction",
    "  discard                        drop all staged changes",
    "  quit                           leave (quit! discards staged changes)",
    "Rows: +N is the N-th new row, N is the N-th row of the current page.",
];

type Lines = Vec<String>;

/// Whether the caller should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// One open database and the table being edited.
pub struct Session {
    engine: SqliteEngine,
    page_size: usize,
    current: Option<TableView>,
}

struct TableView {
    staged: StagedChanges,
    page: RecordPage,
    offset: usize,
    filter: Option<Filter>,
}

impl TableView {
    fn table(&self) -> &str {
        &self.staged.schema().table
    }
}

impl Session {
    pub fn new(engine: SqliteEngine, page_size: usize) -> Self {
        Self {
            engine,
            page_size: page_size.max(1),
            current: None,
        }
    }

    /// Prompt text; a `*` marks unsaved changes.
    pub fn prompt(&self) -> String {
        match &self.current {
            Some(view) if view.staged.has_dirty_edits() => format!("dbc:{}*> ", view.table()),
            Some(view) => format!("dbc:{}> ", view.table()),
            None => "dbc> ".to_string(),
        }
    }

    /// Staged changes in the active table.
    pub fn dirty_count(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |view| view.staged.dirty_count())
    }

    /// Runs one command line.
    ///
    /// Command failures are written to `out` as `error: ...` lines; only a
    /// failure to write is returned.
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> std::io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Flow::Continue);
        }

        let (command, args) = split_word(line);
        let result = match command {
            "tables" => self.tables(),
            "use" => self.use_table(args, false),
            "use!" => self.use_table(args, true),
            "schema" => self.schema(),
            "rows" => self.view().map(|view| render_rows(view, self.page_size)),
            "next" => self.turn_page(true),
            "prev" => self.turn_page(false),
            "filter" => self.filter(args),
            "operators" => self.operators(args),
            "insert" => self.insert(),
            "set" => self.set(args),
            "null" => self.set_null(args),
            "delete" => self.delete(args),
            "undo" => self.undo(),
            "redo" => self.redo(),
            "changes" => self.changes(args),
            "save" => self.save(),
            "discard" => self.discard(),
            "help" => Ok(HELP.iter().map(|line| line.to_string()).collect()),
            "quit" | "exit" if self.dirty_count() > 0 => Err(format!(
                "{} unsaved changes; save, discard, or quit! to leave anyway",
                self.dirty_count()
            )),
            "quit" | "exit" | "quit!" => return Ok(Flow::Quit),
            other => Err(format!("unknown command: {other} (try `help`)")),
        };

        match result {
            Ok(lines) => {
                for line in lines {
                    writeln!(out, "{line}")?;
                }
            }
            Err(err) => {
                debug!(command, error = %err, "Command failed");
                writeln!(out, "error: {err}")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn view(&self) -> Result<&TableView, String> {
        self.current.as_ref().ok_or_else(|| NO_TABLE.to_string())
    }

    fn tables(&self) -> Result<Lines, String> {
        let tables = self.engine.list_tables().map_err(|e| e.to_string())?;
        if tables.is_empty() {
            return Ok(vec!["No tables".to_string()]);
        }
        Ok(tables.into_iter().map(|t| t.name).collect())
    }

    fn use_table(&mut self, args: &str, force: bool) -> Result<Lines, String> {
        let name = args.trim();
        if name.is_empty() {
            return Err("usage: use <table>".to_string());
        }
        let unsaved = self
            .current
            .as_ref()
            .filter(|view| !force && view.staged.has_dirty_edits());
        if let Some(view) = unsaved {
            return Err(format!(
                "{} unsaved changes in {}; save, discard, or use! {name}",
                view.staged.dirty_count(),
                view.table()
            ));
        }

        let table = self
            .engine
            .list_tables()
            .map_err(|e| e.to_string())?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("unknown table: {name}"))?;
        let schema = self
            .engine
            .table_schema(&table.name)
            .map_err(|e| e.to_string())?;

        let mut view = TableView {
            staged: StagedChanges::new(schema),
            page: RecordPage::default(),
            offset: 0,
            filter: None,
        };
        load_page(&self.engine, &mut view, self.page_size)?;

        let mut lines = vec![describe_table(view.staged.schema())];
        lines.extend(render_rows(&view, self.page_size));
        self.current = Some(view);
        Ok(lines)
    }

    fn schema(&self) -> Result<Lines, String> {
        let view = self.view()?;
        let headers = ["column", "type", "attributes"].map(String::from).to_vec();
        let rows = view
            .staged
            .columns()
            .iter()
            .map(|column| {
                let mut attributes = Vec::new();
                if column.primary_key {
                    attributes.push("PRIMARY KEY".to_string());
                }
                if column.auto_increment {
                    attributes.push("AUTOINCREMENT".to_string());
                }
                if !column.nullable {
                    attributes.push("NOT NULL".to_string());
                }
                if let Some(default) = &column.default_value {
                    attributes.push(format!("DEFAULT {default}"));
                }
                vec![
                    column.name.clone(),
                    column.declared_type.clone(),
                    attributes.join(", "),
                ]
            })
            .collect::<Vec<_>>();
        Ok(render_table(&headers, &rows))
    }

    fn turn_page(&mut self, forward: bool) -> Result<Lines, String> {
        let page_size = self.page_size;
        let view = self.current.as_mut().ok_or_else(|| NO_TABLE.to_string())?;
        let previous = view.offset;
        if forward {
            if !view.page.has_more {
                return Err("already on the last page".to_string());
            }
            view.offset += page_size;
        } else {
            if view.offset == 0 {
                return Err("already on the first page".to_string());
            }
            view.offset = view.offset.saturating_sub(page_size);
        }
        if let Err(err) = load_page(&self.engine, view, page_size) {
            view.offset = previous;
            return Err(err);
        }
        Ok(render_rows(view, page_size))
    }

    fn filter(&mut self, args: &str) -> Result<Lines, String> {
        let page_size = self.page_size;
        let view = self.current.as_mut().ok_or_else(|| NO_TABLE.to_string())?;
        let (column, rest) = split_word(args);

        let filter = match column {
            "" => return Err("usage: filter <column> <operator> [value] | filter clear".to_string()),
            "clear" if rest.is_empty() => None,
            column => {
                let index = column_index(view.staged.schema(), column)?;
                let (operator, value) = split_operator(rest)?;
                if operator.requires_value && value.is_empty() {
                    return Err(format!("operator {} requires a value", operator.sql));
                }
                if !operator.requires_value && !value.is_empty() {
                    return Err(format!("operator {} takes no value", operator.sql));
                }
                Some(Filter {
                    column: view.staged.columns()[index].name.clone(),
                    operator,
                    value: value.to_string(),
                })
            }
        };

        let previous = (view.filter.clone(), view.offset);
        view.filter = filter;
        view.offset = 0;
        if let Err(err) = load_page(&self.engine, view, page_size) {
            (view.filter, view.offset) = previous;
            return Err(err);
        }
        Ok(render_rows(view, page_size))
    }

    fn operators(&self, args: &str) -> Result<Lines, String> {
        let view = self.view()?;
        let index = column_index(view.staged.schema(), args.trim())?;
        let column = &view.staged.columns()[index];
        let operators = self.engine.operators(&column.declared_type);
        Ok(operators
            .iter()
            .map(|op| {
                let arity = if op.requires_value { "<value>" } else { "" };
                format!("{:<12} {:<8} {}", op.sql, arity, op.name).trim_end().to_string()
            })
            .collect())
    }

    fn editable(&mut self) -> Result<&mut TableView, String> {
        let view = self.current.as_mut().ok_or_else(|| NO_TABLE.to_string())?;
        if !view.staged.schema().has_primary_key() {
            return Err(EditError::NoPrimaryKey.to_string());
        }
        Ok(view)
    }

    fn insert(&mut self) -> Result<Lines, String> {
        let page_size = self.page_size;
        let view = self.editable()?;
        view.staged.add_insert();
        let mut lines = vec!["Added +1".to_string()];
        lines.extend(render_rows(view, page_size));
        Ok(lines)
    }

    fn set(&mut self, args: &str) -> Result<Lines, String> {
        let (row, rest) = split_word(args);
        let (column, text) = split_word(rest);
        if row.is_empty() || column.is_empty() {
            return Err("usage: set <row> <column> <text>".to_string());
        }

        let view = self.editable()?;
        let index = column_index(view.staged.schema(), column)?;
        let column = &view.staged.columns()[index];
        let text = match codec::input_spec(&column.declared_type) {
            codec::InputSpec::Select(options) => options
                .iter()
                .find(|option| option.eq_ignore_ascii_case(text.trim()))
                .cloned()
                .ok_or_else(|| format!("{} accepts one of: {}", column.name, options.join(", ")))?,
            codec::InputSpec::Text => text.to_string(),
        };
        let value = codec::parse_value(&column.declared_type, &text, false, column.nullable)
            .map_err(|e| format!("{}: {e}", column.name))?;
        stage(view, row, index, value)
    }

    fn set_null(&mut self, args: &str) -> Result<Lines, String> {
        let (row, rest) = split_word(args);
        let (column, extra) = split_word(rest);
        if row.is_empty() || column.is_empty() || !extra.is_empty() {
            return Err("usage: null <row> <column>".to_string());
        }

        let view = self.editable()?;
        let index = column_index(view.staged.schema(), column)?;
        let column = &view.staged.columns()[index];
        let value = codec::parse_value(&column.declared_type, "", true, column.nullable)
            .map_err(|e| format!("{}: {e}", column.name))?;
        stage(view, row, index, value)
    }

    fn delete(&mut self, args: &str) -> Result<Lines, String> {
        let row = args.trim();
        if row.is_empty() {
            return Err("usage: delete <row>".to_string());
        }
        let view = self.editable()?;
        let row_ref = resolve_row(&view.page, view.staged.inserts().len(), row)?;
        let marked = view.staged.toggle_delete(row_ref).map_err(|e| e.to_string())?;
        let message = match (row_ref_is_insert(row), marked) {
            (true, _) => format!("Removed new row {row}"),
            (false, true) => format!("Row {row} marked for deletion"),
            (false, false) => format!("Row {row} no longer marked for deletion"),
        };
        Ok(vec![message])
    }

    fn undo(&mut self) -> Result<Lines, String> {
        let view = self.current.as_mut().ok_or_else(|| NO_TABLE.to_string())?;
        if !view.staged.undo() {
            return Err("nothing to undo".to_string());
        }
        Ok(vec![format!("Undone ({} staged changes)", view.staged.dirty_count())])
    }

    fn redo(&mut self) -> Result<Lines, String> {
        let view = self.current.as_mut().ok_or_else(|| NO_TABLE.to_string())?;
        if !view.staged.redo() {
            return Err("nothing to redo".to_string());
        }
        Ok(vec![format!("Redone ({} staged changes)", view.staged.dirty_count())])
    }

    fn changes(&self, args: &str) -> Result<Lines, String> {
        let json = match args.trim() {
            "" => false,
            "--json" => true,
            _ => return Err("usage: changes [--json]".to_string()),
        };
        let view = self.view()?;
        let changes = if view.staged.has_dirty_edits() {
            dbc_core::plan(&view.staged).map_err(|e| e.to_string())?
        } else if json {
            Default::default()
        } else {
            return Ok(vec!["No staged changes".to_string()]);
        };

        if json {
            let text = serde_json::to_string_pretty(&changes).map_err(|e| e.to_string())?;
            return Ok(text.lines().map(String::from).collect());
        }

        let mut lines = Vec::with_capacity(changes.len());
        for insert in &changes.inserts {
            let values = insert
                .values
                .iter()
                .chain(&insert.explicit_auto_values)
                .map(|cv| format!("{}={}", cv.column, cv.value))
                .collect::<Vec<_>>();
            lines.push(format!("INSERT {}", values.join(", ")));
        }
        for update in &changes.updates {
            let values = update
                .changes
                .iter()
                .map(|cv| format!("{}={}", cv.column, cv.value))
                .collect::<Vec<_>>();
            lines.push(format!(
                "UPDATE {}: {}",
                update.identity.signature(),
                values.join(", ")
            ));
        }
        for delete in &changes.deletes {
            lines.push(format!("DELETE {}", delete.identity.signature()));
        }
        Ok(lines)
    }

    fn save(&mut self) -> Result<Lines, String> {
        let page_size = self.page_size;
        let view = self.current.as_mut().ok_or_else(|| NO_TABLE.to_string())?;
        let table = view.table().to_string();
        let saved = dbc_core::save(&mut view.staged, &table, &mut self.engine)
            .map_err(|e| e.to_string())?;

        // Rows on screen are stale after a commit.
        load_page(&self.engine, view, page_size)?;
        let mut lines = vec![format!("Saved {saved} changes to {table}")];
        lines.extend(render_rows(view, page_size));
        Ok(lines)
    }

    fn discard(&mut self) -> Result<Lines, String> {
        let view = self.current.as_mut().ok_or_else(|| NO_TABLE.to_string())?;
        let count = view.staged.dirty_count();
        if count == 0 {
            return Ok(vec!["No staged changes".to_string()]);
        }
        view.staged.clear();
        Ok(vec![format!("Discarded {count} staged changes")])
    }
}

fn stage(view: &mut TableView, row: &str, column: usize, value: Value) -> Result<Lines, String> {
    let row_ref = resolve_row(&view.page, view.staged.inserts().len(), row)?;
    view.staged
        .stage_cell_edit(row_ref, column, value)
        .map_err(|e| e.to_string())?;
    Ok(vec![format!(
        "Staged {} on row {row} ({} staged changes)",
        view.staged.columns()[column].name,
        view.staged.dirty_count()
    )])
}

/// Reloads the current page, stepping back when the page has emptied.
fn load_page(engine: &SqliteEngine, view: &mut TableView, page_size: usize) -> Result<(), String> {
    loop {
        view.page = engine
            .list_records(view.table(), view.offset, page_size, view.filter.as_ref())
            .map_err(|e| e.to_string())?;
        if !view.page.rows.is_empty() || view.offset == 0 {
            break;
        }
        view.offset = view.offset.saturating_sub(page_size);
    }
    debug!(
        table = view.table(),
        offset = view.offset,
        rows = view.page.rows.len(),
        "Loaded page"
    );
    Ok(())
}

fn describe_table(schema: &TableSchema) -> String {
    let keys = schema
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>();
    if keys.is_empty() {
        return format!(
            "Using {} ({} columns, no primary key: read-only)",
            schema.table,
            schema.columns.len()
        );
    }
    format!(
        "Using {} ({} columns, key: {})",
        schema.table,
        schema.columns.len(),
        keys.join(", ")
    )
}

/// Pending inserts first, then the page with staged values overlaid.
///
/// Row labels carry a marker: `*` for a row with staged edits, `-` for a row
/// marked for deletion.
fn render_rows(view: &TableView, page_size: usize) -> Lines {
    let columns = view.staged.columns();
    let mut headers = vec!["#".to_string()];
    headers.extend(columns.iter().map(|c| c.name.clone()));

    let mut rows = Vec::new();
    for (i, insert) in view.staged.inserts().iter().enumerate() {
        let mut cells = vec![format!("+{}", i + 1)];
        cells.extend((0..columns.len()).map(|col| match insert.value(col) {
            Some(value) if insert.uses_database_default(col) => format!("({value})"),
            Some(value) => value.to_string(),
            None => String::new(),
        }));
        rows.push(cells);
    }
    for (i, record) in view.page.rows.iter().enumerate() {
        let pending = view.staged.pending_update(record);
        let marker = if view.staged.is_marked_for_delete(record) {
            "-"
        } else if pending.is_some() {
            "*"
        } else {
            ""
        };
        let mut cells = vec![format!("{}{marker}", i + 1)];
        cells.extend((0..columns.len()).map(|col| {
            match pending.and_then(|update| update.changes.get(&col)) {
                Some(value) => value.to_string(),
                None => record.get(col).unwrap_or_default().to_string(),
            }
        }));
        rows.push(cells);
    }

    let mut lines = render_table(&headers, &rows);
    lines.push(page_footer(view, page_size));
    lines
}

fn page_footer(view: &TableView, page_size: usize) -> String {
    let mut parts = Vec::new();
    let shown = view.page.rows.len();
    if shown == 0 {
        parts.push("no rows".to_string());
    } else {
        parts.push(format!(
            "page {}, rows {}-{}",
            view.offset / page_size + 1,
            view.offset + 1,
            view.offset + shown
        ));
    }
    if view.page.has_more {
        parts.push("more with `next`".to_string());
    }
    if let Some(filter) = &view.filter {
        let value = if filter.operator.requires_value {
            format!(" {}", filter.value)
        } else {
            String::new()
        };
        parts.push(format!(
            "filter: {} {}{value}",
            filter.column, filter.operator.sql
        ));
    }
    let dirty = view.staged.dirty_count();
    if dirty > 0 {
        parts.push(format!("{dirty} staged changes"));
    }
    format!("({})", parts.join("; "))
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> Lines {
    let headers: Vec<String> = headers.iter().map(|h| clip(h)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| clip(cell)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(headers.as_slice()));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| format_row(row.as_slice())));
    lines
}

/// Single-line cell text, cut to the column width limit.
fn clip(text: &str) -> String {
    let text = text.replace(['\r', '\n', '\t'], " ");
    if text.chars().count() <= MAX_CELL_WIDTH {
        return text;
    }
    let mut clipped: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
    clipped.push_str("...");
    clipped
}

/// Splits off the first whitespace-delimited word; the rest is left-trimmed.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim_start()),
        None => (text, ""),
    }
}

/// Reads an operator that may span several words (`IS NOT NULL`), preferring
/// the longest match, and returns it with the remaining text.
fn split_operator(text: &str) -> Result<(Operator, &str), String> {
    for word_count in (1..=3).rev() {
        let mut rest = text;
        let mut words = Vec::with_capacity(word_count);
        while words.len() < word_count {
            let (word, tail) = split_word(rest);
            if word.is_empty() {
                break;
            }
            words.push(word);
            rest = tail;
        }
        if words.len() < word_count {
            continue;
        }
        if let Ok(operator) = find_operator(&words.join(" ")) {
            return Ok((operator, rest.trim_end()));
        }
    }
    match split_word(text).0 {
        "" => Err("usage: filter <column> <operator> [value]".to_string()),
        word => Err(format!("unknown operator: {word}")),
    }
}

fn column_index(schema: &TableSchema, name: &str) -> Result<usize, String> {
    if name.is_empty() {
        return Err("column name is required".to_string());
    }
    schema
        .column_index(name)
        .ok_or_else(|| format!("unknown column: {name}"))
}

fn row_ref_is_insert(text: &str) -> bool {
    text.starts_with('+')
}

/// `+N` names the N-th pending insert, `N` the N-th row of the page.
fn resolve_row<'a>(
    page: &'a RecordPage,
    insert_count: usize,
    text: &str,
) -> Result<RowRef<'a>, String> {
    let invalid = || format!("invalid row: {text} (use +N for new rows, N for page rows)");
    if let Some(number) = text.strip_prefix('+') {
        let n: usize = number.parse().map_err(|_| invalid())?;
        if n == 0 || n > insert_count {
            return Err(format!("no new row +{n}"));
        }
        return Ok(RowRef::Insert(n - 1));
    }
    let n: usize = text.parse().map_err(|_| invalid())?;
    n.checked_sub(1)
        .and_then(|i| page.rows.get(i))
        .map(RowRef::Persisted)
        .ok_or_else(|| format!("no row {n} on this page"))
}
