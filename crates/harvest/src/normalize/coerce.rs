//! Type coercion, one function per [`ColumnKind`].
//!
//! Every function converts a whole column or nothing: the first value that
//! cannot be converted aborts with a message and the caller keeps the column
//! as it was.

use chrono::{DateTime, Utc};

use crate::schema::{ColumnKind, parse_datetime, parse_float, parse_int};
use crate::table::Cell;

/// Suffix of the column holding decoded boolean values.
pub const BOOL_SUFFIX: &str = "_bool";

const TRUE_VALUES: &[&str] = &["Y", "Yes", "y", "YES", "True", "TRUE", "true"];
const FALSE_VALUES: &[&str] = &["N", "No", "n", "NO", "False", "FALSE", "false"];

/// Settings shared by the coercion functions.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionOptions {
    /// Decimal places kept by float columns.
    pub decimals: u32,
    /// Strict datetime layout (chrono syntax). `None` accepts RFC 3339 and
    /// the common date forms.
    pub datetime_format: Option<String>,
}

impl Default for CoercionOptions {
    fn default() -> Self {
        Self {
            decimals: 3,
            datetime_format: None,
        }
    }
}

/// Result of coercing one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The column's cells, converted in place.
    Replace(Vec<Cell>),
    /// A new companion column (boolean decoding).
    Companion { name: String, cells: Vec<Cell> },
}

/// Coerce `cells` of column `column` to `kind`.
pub fn coerce(
    column: &str,
    cells: &[Cell],
    kind: ColumnKind,
    options: &CoercionOptions,
) -> Result<Coerced, String> {
    match kind {
        ColumnKind::Int => to_int(cells).map(Coerced::Replace),
        ColumnKind::Float => to_float(cells, options.decimals).map(Coerced::Replace),
        ColumnKind::Datetime => {
            to_datetime(cells, options.datetime_format.as_deref()).map(Coerced::Replace)
        }
        ColumnKind::String => Ok(Coerced::Replace(to_string(cells))),
        ColumnKind::Boolean => Ok(Coerced::Companion {
            name: format!("{}{}", column, BOOL_SUFFIX),
            cells: to_boolean(cells),
        }),
    }
}

fn each<F>(cells: &[Cell], mut convert: F) -> Result<Vec<Cell>, String>
where
    F: FnMut(&Cell) -> Option<Cell>,
{
    cells
        .iter()
        .map(|cell| match cell {
            Cell::Null => Ok(Cell::Null),
            other => convert(other).ok_or_else(|| format!("cannot convert '{}'", other)),
        })
        .collect()
}

pub fn to_int(cells: &[Cell]) -> Result<Vec<Cell>, String> {
    each(cells, |cell| match cell {
        Cell::Int(i) => Some(Cell::Int(*i)),
        Cell::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(Cell::Int(*f as i64)),
        Cell::Bool(b) => Some(Cell::Int(i64::from(*b))),
        Cell::Text(text) => parse_int(text).map(Cell::Int),
        _ => None,
    })
}

pub fn to_float(cells: &[Cell], decimals: u32) -> Result<Vec<Cell>, String> {
    let scale = 10f64.powi(decimals.min(15) as i32);
    let round = |x: f64| (x * scale).round() / scale;
    each(cells, |cell| match cell {
        Cell::Float(f) => Some(Cell::Float(round(*f))),
        Cell::Int(i) => Some(Cell::Float(*i as f64)),
        Cell::Text(text) => parse_float(text).map(|f| Cell::Float(round(f))),
        _ => None,
    })
}

/// With a strict format, values must match it; values already in the
/// canonical RFC 3339 output form are accepted too.
pub fn to_datetime(cells: &[Cell], format: Option<&str>) -> Result<Vec<Cell>, String> {
    each(cells, |cell| match cell {
        Cell::DateTime(dt) => Some(Cell::DateTime(*dt)),
        Cell::Text(text) => parse_datetime(text, format)
            .or_else(|| format.and_then(|_| parse_canonical(text)))
            .map(Cell::DateTime),
        _ => None,
    })
}

fn parse_canonical(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn to_string(cells: &[Cell]) -> Vec<Cell> {
    cells
        .iter()
        .map(|cell| match cell {
            Cell::Null => Cell::Null,
            Cell::Text(text) => Cell::Text(text.clone()),
            other => Cell::Text(other.to_string()),
        })
        .collect()
}

/// Decode through the yes/no sentinel table. Anything not in the table
/// decodes to null.
pub fn to_boolean(cells: &[Cell]) -> Vec<Cell> {
    cells.iter().map(decode_bool).collect()
}

fn decode_bool(cell: &Cell) -> Cell {
    match cell {
        Cell::Bool(b) => Cell::Bool(*b),
        Cell::Text(text) => {
            let text = text.trim();
            if TRUE_VALUES.contains(&text) {
                Cell::Bool(true)
            } else if FALSE_VALUES.contains(&text) {
                Cell::Bool(false)
            } else {
                Cell::Null
            }
        }
        _ => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn text(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from_text(v)).collect()
    }

    #[test]
    fn test_int_all_or_nothing() {
        assert_eq!(
            to_int(&text(&["1", "", "3.0"])).unwrap(),
            vec![Cell::Int(1), Cell::Null, Cell::Int(3)]
        );
        assert!(to_int(&text(&["1", "two"])).is_err());
    }

    #[test]
    fn test_float_rounding() {
        let cells = to_float(&[Cell::Float(1.23456), Cell::Int(2), Cell::from_text("0.0005")], 3).unwrap();
        assert_eq!(cells, vec![Cell::Float(1.235), Cell::Float(2.0), Cell::Float(0.001)]);
    }

    #[test]
    fn test_datetime_strict_format_failure_leaves_column() {
        let cells = text(&["01/03/2024", "not a date"]);
        assert!(to_datetime(&cells, Some("%d/%m/%Y")).is_err());

        let ok = to_datetime(&text(&["01/03/2024"]), Some("%d/%m/%Y")).unwrap();
        assert_eq!(
            ok,
            vec![Cell::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())]
        );
    }

    #[test]
    fn test_datetime_accepts_canonical_output_under_strict_format() {
        let cells = text(&["2024-03-01T00:00:00Z"]);
        assert!(to_datetime(&cells, Some("%d/%m/%Y")).is_ok());
    }

    #[test]
    fn test_boolean_sentinel_table() {
        let cells = vec![
            Cell::from_text("Yes"),
            Cell::from_text("No"),
            Cell::from_text("Y"),
            Cell::from_text("FALSE"),
            Cell::from_text("maybe"),
            Cell::Null,
        ];
        assert_eq!(
            to_boolean(&cells),
            vec![
                Cell::Bool(true),
                Cell::Bool(false),
                Cell::Bool(true),
                Cell::Bool(false),
                Cell::Null,
                Cell::Null
            ]
        );
    }

    #[test]
    fn test_boolean_spellings_outside_table_are_null() {
        assert_eq!(
            to_boolean(&text(&["tRuE", "fAlSe", "yEs", "true", "No"])),
            vec![Cell::Null, Cell::Null, Cell::Null, Cell::Bool(true), Cell::Bool(false)]
        );
    }

    #[test]
    fn test_boolean_goes_to_companion_column() {
        let result = coerce(
            "cylDeact",
            &text(&["Y"]),
            ColumnKind::Boolean,
            &CoercionOptions::default(),
        )
        .unwrap();
        assert_eq!(
            result,
            Coerced::Companion {
                name: "cylDeact_bool".to_string(),
                cells: vec![Cell::Bool(true)]
            }
        );
    }

    #[test]
    fn test_string_cast() {
        assert_eq!(
            to_string(&[Cell::Int(7), Cell::Null, Cell::Float(2.0)]),
            vec![Cell::Text("7".into()), Cell::Null, Cell::Text("2.0".into())]
        );
    }
}
