//! Per-column kind inference over a raw dataset.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::table::{Cell, Dataset};

use super::descriptor::TypeDescriptor;
use super::types::{ColumnKind, parse_bool_literal, parse_datetime, parse_float};

// =============================================================================
// LAZY STATIC PATTERNS
// =============================================================================
// Shapes a text value must have before a datetime parse is attempted.

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap(), // ISO date
        Regex::new(r"^\d{2}/\d{2}/\d{4}").unwrap(), // US date
        Regex::new(r"^\d{4}/\d{2}/\d{2}").unwrap(), // Alt ISO
    ]
});

/// Columns always treated as boolean, whatever their values look like.
pub const DEFAULT_BOOLEAN_OVERRIDES: &[&str] = &["cylDeact", "cylDeactYesNo", "mpgData"];

/// Builds a [`TypeDescriptor`] from a raw dataset.
#[derive(Debug, Clone)]
pub struct SchemaInferencer {
    boolean_overrides: Vec<String>,
}

impl Default for SchemaInferencer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaInferencer {
    pub fn new() -> Self {
        Self {
            boolean_overrides: DEFAULT_BOOLEAN_OVERRIDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replace the list of columns forced to boolean.
    pub fn with_boolean_overrides(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.boolean_overrides = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Infer a descriptor named `name` for every column of `dataset`.
    pub fn infer(&self, name: &str, dataset: &Dataset) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::new(name);
        for (index, column) in dataset.columns.iter().enumerate() {
            let (kind, example) = self.infer_column(dataset.column_values(index));
            let kind = if self.boolean_overrides.iter().any(|c| c == column) {
                ColumnKind::Boolean
            } else {
                kind
            };
            debug!(column = %column, kind = %kind, "inferred column kind");
            descriptor.insert(column.clone(), kind, example);
        }
        descriptor
    }

    /// Kind and example for one column's cells.
    ///
    /// A column whose non-null cells all share a native kind gets it (int and
    /// float mixed give float). Otherwise the first non-null value decides: a
    /// parseable datetime string gives datetime, anything else its own type.
    pub fn infer_column<'a>(&self, cells: impl Iterator<Item = &'a Cell>) -> (ColumnKind, Value) {
        let mut example: Option<&Cell> = None;
        let mut native: Option<Option<ColumnKind>> = None;

        for cell in cells.filter(|c| !c.is_null()) {
            example.get_or_insert(cell);
            let kind = native_kind(cell);
            native = Some(match native {
                None => kind,
                Some(current) => merge(current, kind),
            });
        }

        let Some(example) = example else {
            return (ColumnKind::String, Value::Null);
        };

        let kind = match native.flatten() {
            Some(kind) => kind,
            None => example_kind(example),
        };
        (kind, example.to_json())
    }
}

/// The kind a single cell has on its own, if it is unambiguously typed.
fn native_kind(cell: &Cell) -> Option<ColumnKind> {
    match cell {
        Cell::Null | Cell::Nested(_) => None,
        Cell::Bool(_) => Some(ColumnKind::Boolean),
        Cell::Int(_) => Some(ColumnKind::Int),
        Cell::Float(_) => Some(ColumnKind::Float),
        Cell::DateTime(_) => Some(ColumnKind::Datetime),
        Cell::Text(text) => {
            if text.trim().parse::<i64>().is_ok() {
                Some(ColumnKind::Int)
            } else if parse_float(text).is_some() {
                Some(ColumnKind::Float)
            } else if parse_bool_literal(text).is_some() {
                Some(ColumnKind::Boolean)
            } else {
                None
            }
        }
    }
}

fn merge(current: Option<ColumnKind>, next: Option<ColumnKind>) -> Option<ColumnKind> {
    match (current?, next?) {
        (a, b) if a == b => Some(a),
        (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
            Some(ColumnKind::Float)
        }
        _ => None,
    }
}

/// Classification by the example value alone.
fn example_kind(example: &Cell) -> ColumnKind {
    match example {
        Cell::Text(text) if looks_like_datetime(text) => ColumnKind::Datetime,
        Cell::Text(_) => ColumnKind::String,
        Cell::Bool(_) => ColumnKind::Boolean,
        Cell::Int(_) => ColumnKind::Int,
        Cell::Float(_) => ColumnKind::Float,
        Cell::DateTime(_) => ColumnKind::Datetime,
        Cell::Null | Cell::Nested(_) => ColumnKind::String,
    }
}

fn looks_like_datetime(text: &str) -> bool {
    let text = text.trim();
    DATE_PATTERNS.iter().any(|p| p.is_match(text)) && parse_datetime(text, None).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(rows: Vec<Value>) -> Dataset {
        let objects: Vec<_> = rows.iter().map(|r| r.as_object().unwrap()).collect();
        Dataset::from_json_records("t", objects)
    }

    #[test]
    fn test_native_kinds() {
        let data = dataset(vec![
            json!({"id": 1, "mpg": 21.5, "ok": true, "name": "Acme"}),
            json!({"id": 2, "mpg": 22, "ok": false, "name": "Bolt"}),
        ]);
        let descriptor = SchemaInferencer::new().infer("t", &data);

        assert_eq!(descriptor.kind("id"), Some(ColumnKind::Int));
        assert_eq!(descriptor.kind("mpg"), Some(ColumnKind::Float));
        assert_eq!(descriptor.kind("ok"), Some(ColumnKind::Boolean));
        assert_eq!(descriptor.kind("name"), Some(ColumnKind::String));
        assert_eq!(descriptor.columns["id"].example, json!(1));
    }

    #[test]
    fn test_example_is_first_non_null() {
        let data = dataset(vec![
            json!({"updated_at": null}),
            json!({"updated_at": "2024-02-01T10:00:00Z"}),
        ]);
        let descriptor = SchemaInferencer::new().infer("t", &data);

        assert_eq!(descriptor.kind("updated_at"), Some(ColumnKind::Datetime));
        assert_eq!(descriptor.columns["updated_at"].example, json!("2024-02-01T10:00:00Z"));
    }

    #[test]
    fn test_text_cells_read_back_from_file() {
        let data = Dataset::with_rows(
            "t",
            vec!["year".into(), "displ".into(), "trany".into()],
            vec![
                vec![Cell::from_text("2024"), Cell::from_text("2.0"), Cell::from_text("Automatic (S6)")],
                vec![Cell::from_text("2023"), Cell::from_text("3"), Cell::from_text("Manual 5-spd")],
            ],
        );
        let descriptor = SchemaInferencer::new().infer("t", &data);

        assert_eq!(descriptor.kind("year"), Some(ColumnKind::Int));
        assert_eq!(descriptor.kind("displ"), Some(ColumnKind::Float));
        assert_eq!(descriptor.kind("trany"), Some(ColumnKind::String));
    }

    #[test]
    fn test_mixed_column_uses_example() {
        let data = dataset(vec![json!({"x": 5}), json!({"x": "n/a"})]);
        let descriptor = SchemaInferencer::new().infer("t", &data);
        assert_eq!(descriptor.kind("x"), Some(ColumnKind::Int));
    }

    #[test]
    fn test_overrides_force_boolean() {
        let data = dataset(vec![json!({"cylDeact": "N", "mpgData": "Y", "trany": "N"})]);
        let descriptor = SchemaInferencer::new().infer("t", &data);

        assert_eq!(descriptor.kind("cylDeact"), Some(ColumnKind::Boolean));
        assert_eq!(descriptor.kind("mpgData"), Some(ColumnKind::Boolean));
        assert_eq!(descriptor.kind("trany"), Some(ColumnKind::String));
    }

    #[test]
    fn test_all_null_column_is_string() {
        let data = dataset(vec![json!({"x": null}), json!({"x": null})]);
        let descriptor = SchemaInferencer::new().infer("t", &data);
        assert_eq!(descriptor.kind("x"), Some(ColumnKind::String));
        assert_eq!(descriptor.columns["x"].example, Value::Null);
    }

    #[test]
    fn test_nested_column_is_string() {
        let data = dataset(vec![json!({"ev_connector_types": ["J1772", "CHADEMO"]})]);
        let descriptor = SchemaInferencer::new().infer("t", &data);
        assert_eq!(descriptor.kind("ev_connector_types"), Some(ColumnKind::String));
    }
}
