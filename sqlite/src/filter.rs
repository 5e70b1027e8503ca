//! Display filters: the operator allow-list and `WHERE` clause building.

use dbc_core::{Filter, Operator};
use rusqlite::types::Value as SqlValue;

use crate::error::{Result, SqliteError};
use crate::sql::quote_identifier;

const fn operator(name: &'static str, sql: &'static str, requires_value: bool) -> Operator {
    Operator {
        name,
        sql,
        requires_value,
    }
}

/// Every operator a filter may use.
pub const OPERATORS: [Operator; 9] = [
    operator("Equals", "=", true),
    operator("Not Equals", "!=", true),
    operator("Less Than", "<", true),
    operator("Less Or Equal", "<=", true),
    operator("Greater Than", ">", true),
    operator("Greater Or Equal", ">=", true),
    operator("Like", "LIKE", true),
    operator("Is Null", "IS NULL", false),
    operator("Is Not Null", "IS NOT NULL", false),
];

/// Operators offered for a column of the given declared type.
///
/// SQLite compares any two values, so every type gets the full list.
pub fn operators_for_type(_declared_type: &str) -> &'static [Operator] {
    &OPERATORS
}

/// Looks up an operator by its SQL text or display name, ignoring case.
///
/// # Errors
///
/// Returns [`SqliteError::UnknownOperator`] if nothing matches.
///
/// # Examples
///
/// ```
/// use dbc_sqlite::find_operator;
///
/// assert_eq!(find_operator("like").unwrap().sql, "LIKE");
/// assert_eq!(find_operator("is not null").unwrap().name, "Is Not Null");
/// assert!(find_operator("; DROP TABLE users").is_err());
/// ```
pub fn find_operator(text: &str) -> Result<Operator> {
    let text = text.trim();
    OPERATORS
        .iter()
        .find(|op| op.sql.eq_ignore_ascii_case(text) || op.name.eq_ignore_ascii_case(text))
        .copied()
        .ok_or_else(|| SqliteError::UnknownOperator(text.to_string()))
}

/// Builds `WHERE "col" OP [?]` for an optional filter.
///
/// Returns an empty clause and no parameters when there is no filter. The
/// value is bound only if the operator requires one.
///
/// # Errors
///
/// Returns [`SqliteError::MissingFilterColumn`] for a blank column and
/// [`SqliteError::UnknownOperator`] if the operator's SQL is not on the
/// allow-list.
pub fn build_filter_clause(filter: Option<&Filter>) -> Result<(String, Vec<SqlValue>)> {
    let Some(filter) = filter else {
        return Ok((String::new(), Vec::new()));
    };
    if filter.column.trim().is_empty() {
        return Err(SqliteError::MissingFilterColumn);
    }
    if !OPERATORS
        .iter()
        .any(|op| op.sql.eq_ignore_ascii_case(filter.operator.sql))
    {
        return Err(SqliteError::UnknownOperator(filter.operator.sql.to_string()));
    }

    let mut clause = format!(
        "WHERE {} {}",
        quote_identifier(&filter.column),
        filter.operator.sql
    );
    let mut params = Vec::new();
    if filter.operator.requires_value {
        clause.push_str(" ?");
        params.push(SqlValue::Text(filter.value.clone()));
    }
    Ok((clause, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(column: &str, op: Operator, value: &str) -> Filter {
        Filter {
            column: column.to_string(),
            operator: op,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_operator_catalogue() {
        let ops = operators_for_type("INTEGER");
        assert_eq!(ops.len(), 9);
        assert_eq!(operators_for_type(""), ops);
        let without_value: Vec<&str> = ops
            .iter()
            .filter(|op| !op.requires_value)
            .map(|op| op.sql)
            .collect();
        assert_eq!(without_value, ["IS NULL", "IS NOT NULL"]);
    }

    #[test]
    fn test_no_filter_is_empty_clause() {
        let (clause, params) = build_filter_clause(None).unwrap();
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_binds_value() {
        let f = filter("name", find_operator("=").unwrap(), "bob");
        let (clause, params) = build_filter_clause(Some(&f)).unwrap();
        assert_eq!(clause, "WHERE \"name\" = ?");
        assert_eq!(params, vec![SqlValue::Text("bob".into())]);
    }

    #[test]
    fn test_filter_without_value() {
        let f = filter("deleted_at", find_operator("IS NULL").unwrap(), "ignored");
        let (clause, params) = build_filter_clause(Some(&f)).unwrap();
        assert_eq!(clause, "WHERE \"deleted_at\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_requires_column() {
        let f = filter(" ", OPERATORS[0], "x");
        assert!(matches!(
            build_filter_clause(Some(&f)),
            Err(SqliteError::MissingFilterColumn)
        ));
    }

    #[test]
    fn test_filter_rejects_operator_off_list() {
        let f = filter("name", operator("Sneaky", "= 1 OR 1 =", true), "x");
        assert!(matches!(
            build_filter_clause(Some(&f)),
            Err(SqliteError::UnknownOperator(op)) if op == "= 1 OR 1 ="
        ));
        assert!(matches!(
            find_operator("BETWEEN"),
            Err(SqliteError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_filter_column_is_quoted() {
        let f = filter("we\"ird", OPERATORS[6], "a%");
        let (clause, _) = build_filter_clause(Some(&f)).unwrap();
        assert_eq!(clause, "WHERE \"we\"\"ird\" LIKE ?");
    }
}
