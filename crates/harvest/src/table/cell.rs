//! Cell values held by a [`Dataset`](super::Dataset).

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// A single typed cell.
///
/// Raw payload values arrive as [`Cell::from_json`]; values read back from a
/// delimited file arrive as [`Cell::from_text`] and stay textual until the
/// normalizer coerces them.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    /// A nested array or object kept verbatim until flattened.
    Nested(Value),
}

impl Cell {
    /// Convert a JSON payload value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Cell::Nested(value.clone()),
        }
    }

    /// Convert a field read from a delimited file.
    ///
    /// Empty fields are null. Fields that hold a JSON array or object (as
    /// written for nested cells) are parsed back into [`Cell::Nested`].
    pub fn from_text(field: &str) -> Self {
        if field.is_empty() {
            return Cell::Null;
        }
        let trimmed = field.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            if let Ok(value @ (Value::Array(_) | Value::Object(_))) =
                serde_json::from_str::<Value>(field)
            {
                return Cell::Nested(value);
            }
        }
        Cell::Text(field.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert back to a JSON value (used for descriptor examples).
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::DateTime(dt) => Value::String(format_datetime(dt)),
            Cell::Nested(v) => v.clone(),
        }
    }

    /// Short tag used when hashing rows, so that `Int(1)` and `Text("1")`
    /// never collide.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Bool(_) => 1,
            Cell::Int(_) => 2,
            Cell::Float(_) => 3,
            Cell::Text(_) => 4,
            Cell::DateTime(_) => 5,
            Cell::Nested(_) => 6,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Null
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        Cell::from_json(value)
    }
}

/// Renders the cell as it is written to delimited text. Null renders empty.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => f.write_str(&format_datetime(dt)),
            Cell::Nested(v) => write!(f, "{}", v),
        }
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
