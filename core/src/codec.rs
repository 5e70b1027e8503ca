//! Value codec: declared type → affinity, and user text → typed [`Value`].
//!
//! SQLite columns are loosely typed, so the codec follows SQLite's permissive
//! substring rules for type affinity (plus a `Boolean` convenience affinity)
//! rather than strict typing. Any declared type string, including unknown or
//! empty ones, classifies deterministically.
//!
//! # Examples
//!
//! ```
//! use dbc_core::codec::{self, Affinity, InputSpec};
//! use dbc_core::{RawValue, Value};
//!
//! assert_eq!(codec::classify("DOUBLE PRECISION"), Affinity::Real);
//! assert_eq!(
//!     codec::input_spec("ENUM('a','b','c')"),
//!     InputSpec::Select(vec!["a".into(), "b".into(), "c".into()])
//! );
//!
//! let value = codec::parse_value("INTEGER", " 42 ", false, true).unwrap();
//! assert_eq!(
//!     value,
//!     Value::Typed { text: "42".into(), raw: Some(RawValue::Integer(42)) }
//! );
//! ```

use serde::Serialize;

use crate::error::{EditError, Result, ValueKind};
use crate::types::{Column, RawValue, Value};

/// Type affinity used to pick parsing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Affinity {
    Boolean,
    Integer,
    Real,
    Numeric,
    Text,
    Blob,
}

const TEXT_MARKERS: [&str; 8] = ["CHAR", "CLOB", "TEXT", "DATE", "TIME", "JSON", "UUID", "GUID"];
const REAL_MARKERS: [&str; 3] = ["REAL", "FLOA", "DOUB"];

/// Maps a declared column type to its affinity.
///
/// Rules are case-insensitive substring checks applied in priority order:
/// empty → `Blob`, `BOOL` → `Boolean`, an `ENUM(...)` literal → `Text`,
/// `INT` → `Integer`, text-like markers →
/// `Text`, `BLOB` → `Blob`, `REAL`/`FLOA`/`DOUB` → `Real`, otherwise `Numeric`.
pub fn classify(declared_type: &str) -> Affinity {
    let normalized = declared_type.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Affinity::Blob;
    }
    if normalized.contains("BOOL") {
        return Affinity::Boolean;
    }
    // Enum options are quoted text and may themselves contain other markers.
    if enum_options(declared_type).is_some() {
        return Affinity::Text;
    }
    if normalized.contains("INT") {
        return Affinity::Integer;
    }
    if TEXT_MARKERS.iter().any(|m| normalized.contains(m)) {
        return Affinity::Text;
    }
    if normalized.contains("BLOB") {
        return Affinity::Blob;
    }
    if REAL_MARKERS.iter().any(|m| normalized.contains(m)) {
        return Affinity::Real;
    }
    Affinity::Numeric
}

/// How a cell editor should collect input for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InputSpec {
    /// Free text.
    Text,
    /// One of a fixed set of options.
    Select(Vec<String>),
}

impl InputSpec {
    /// Returns `true` if `text` is acceptable input for this spec.
    ///
    /// Select options match case-insensitively; free text accepts anything.
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            Self::Text => true,
            Self::Select(options) => options.iter().any(|o| o.eq_ignore_ascii_case(text.trim())),
        }
    }
}

/// Returns the input spec for a declared type.
///
/// Boolean columns select between `"true"` and `"false"`; an `ENUM(...)`
/// literal selects between its options; everything else is free text.
pub fn input_spec(declared_type: &str) -> InputSpec {
    if classify(declared_type) == Affinity::Boolean {
        return InputSpec::Select(vec!["true".to_string(), "false".to_string()]);
    }
    match enum_options(declared_type) {
        Some(options) => InputSpec::Select(options),
        None => InputSpec::Text,
    }
}

fn enum_options(declared_type: &str) -> Option<Vec<String>> {
    // ASCII uppercasing keeps byte offsets aligned with the original string.
    let upper = declared_type.to_ascii_uppercase();
    let enum_index = upper.find("ENUM")?;
    let start = enum_index + declared_type[enum_index..].find('(')? + 1;
    let end = declared_type.rfind(')')?;
    if end <= start {
        return None;
    }

    let options: Vec<String> = declared_type[start..end]
        .split(',')
        .map(|raw| raw.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|option| !option.is_empty())
        .collect();

    if options.is_empty() { None } else { Some(options) }
}

/// Parses user text into a typed value for a column of `declared_type`.
///
/// When `is_null` is set the text is ignored: the result is [`Value::Null`]
/// for nullable columns and [`EditError::NullNotAllowed`] otherwise. Numeric
/// affinities parse the trimmed text and keep it as display text; text and
/// blob values keep the input verbatim.
///
/// # Errors
///
/// Returns [`EditError::InvalidValue`] with the affinity's value kind when the
/// text cannot be parsed.
pub fn parse_value(declared_type: &str, text: &str, is_null: bool, nullable: bool) -> Result<Value> {
    if is_null {
        if !nullable {
            return Err(EditError::NullNotAllowed);
        }
        return Ok(Value::Null);
    }

    let trimmed = text.trim();
    match classify(declared_type) {
        Affinity::Boolean => {
            let raw = parse_boolean(trimmed).ok_or(EditError::InvalidValue(ValueKind::Boolean))?;
            Ok(typed(trimmed, RawValue::Integer(raw)))
        }
        Affinity::Integer => {
            let raw = trimmed
                .parse::<i64>()
                .map_err(|_| EditError::InvalidValue(ValueKind::Integer))?;
            Ok(typed(trimmed, RawValue::Integer(raw)))
        }
        Affinity::Real => {
            let raw = parse_real(trimmed).ok_or(EditError::InvalidValue(ValueKind::Real))?;
            Ok(typed(trimmed, RawValue::Real(raw)))
        }
        Affinity::Numeric => {
            let invalid = EditError::InvalidValue(ValueKind::Numeric);
            if trimmed.contains(['.', 'e', 'E']) {
                let raw = parse_real(trimmed).ok_or(invalid)?;
                Ok(typed(trimmed, RawValue::Real(raw)))
            } else {
                let raw = trimmed.parse::<i64>().map_err(|_| invalid)?;
                Ok(typed(trimmed, RawValue::Integer(raw)))
            }
        }
        Affinity::Blob => {
            let hex_digits = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"));
            let bytes = match hex_digits {
                Some(digits) => {
                    hex::decode(digits).map_err(|_| EditError::InvalidValue(ValueKind::Blob))?
                }
                None => text.as_bytes().to_vec(),
            };
            Ok(typed(text, RawValue::Blob(bytes)))
        }
        Affinity::Text => Ok(Value::text(text)),
    }
}

fn typed(text: &str, raw: RawValue) -> Value {
    Value::Typed {
        text: text.to_string(),
        raw: Some(raw),
    }
}

fn parse_boolean(text: &str) -> Option<i64> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(1),
        "false" | "0" => Some(0),
        _ => None,
    }
}

fn parse_real(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok()
}

/// How a column's SQL default should be staged in a new row.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A literal the client can bind itself.
    Literal(Value),
    /// An expression (e.g. `CURRENT_TIMESTAMP`) only the database can evaluate.
    Expression(String),
}

/// Interprets a column's raw SQL default text, if it has one.
///
/// `NULL`, quoted strings, numbers and `TRUE`/`FALSE` are literals; anything
/// else is left for the database to evaluate.
pub fn default_value(column: &Column) -> Option<DefaultValue> {
    let raw = column.default_value.as_deref()?;
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("NULL") {
        return Some(DefaultValue::Literal(Value::Null));
    }
    if let Some(inner) = unquote(trimmed) {
        let value = match classify(&column.declared_type) {
            Affinity::Text | Affinity::Blob => Value::text(inner.clone()),
            _ => parse_value(&column.declared_type, &inner, false, true)
                .unwrap_or_else(|_| Value::text(inner)),
        };
        return Some(DefaultValue::Literal(value));
    }

    let literal = match trimmed.to_ascii_uppercase().as_str() {
        "TRUE" => "1",
        "FALSE" => "0",
        _ => trimmed,
    };
    if is_numeric_literal(literal) {
        let value = parse_value(&column.declared_type, literal, false, true)
            .or_else(|_| parse_value("NUMERIC", literal, false, true))
            .unwrap_or_else(|_| Value::text(literal));
        return Some(DefaultValue::Literal(value));
    }

    Some(DefaultValue::Expression(raw.to_string()))
}

fn is_numeric_literal(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && text.parse::<f64>().is_ok()
}

fn unquote(text: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            let inner = &text[1..text.len() - 1];
            let doubled = format!("{quote}{quote}");
            return Some(inner.replace(&doubled, &quote.to_string()));
        }
    }
    None
}
