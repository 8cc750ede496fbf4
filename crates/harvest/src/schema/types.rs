//! Column kinds and the value parsers behind them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

/// Logical type of a column, as recorded in a type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnKind {
    /// Whole numbers.
    Int,
    /// Floating-point numbers.
    Float,
    /// Yes/no values, decoded into a companion `_bool` column.
    Boolean,
    /// Timestamps, normalized to UTC.
    Datetime,
    /// Free text.
    String,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Int => "int",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Datetime => "datetime",
            ColumnKind::String => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Int | ColumnKind::Float)
    }
}

impl Default for ColumnKind {
    fn default() -> Self {
        ColumnKind::String
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names and the dataframe dtype spellings found in
/// older descriptor files (`int64`, `float64`, `datetime64[ns, UTC]`, `object`, ...).
impl FromStr for ColumnKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let kind = if lower.starts_with("datetime") {
            ColumnKind::Datetime
        } else if lower.starts_with("float") {
            ColumnKind::Float
        } else if lower.starts_with("bool") {
            ColumnKind::Boolean
        } else if lower.starts_with("int") || lower.starts_with("uint") {
            ColumnKind::Int
        } else if matches!(lower.as_str(), "string" | "str" | "object" | "text") {
            ColumnKind::String
        } else {
            return Err(HarvestError::Config(format!("unknown column kind '{}'", s)));
        };
        Ok(kind)
    }
}

impl TryFrom<String> for ColumnKind {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnKind> for String {
    fn from(kind: ColumnKind) -> Self {
        kind.as_str().to_string()
    }
}

// =============================================================================
// VALUE PARSERS
// =============================================================================

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a timestamp.
///
/// With `format`, the text must match it exactly (as a datetime, or as a date
/// at midnight). Without, RFC 3339 and a fixed set of common date and
/// datetime layouts are accepted. Naive values are taken as UTC.
pub fn parse_datetime(text: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(format) = format {
        return parse_with(text, format);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .chain(DATE_FORMATS)
        .find_map(|format| parse_with(text, format))
}

fn parse_with(text: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(text, format) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse an integer, accepting whole floats written as `12.0`.
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(i);
    }
    let f = text.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Literal boolean text (`true`/`false`, any case).
pub fn parse_bool_literal(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
