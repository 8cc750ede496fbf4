//! Flattening of nested one-to-many fields into derived tables.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::table::{Cell, Dataset};

/// Moves nested columns out of a table.
///
/// A column is nested when every non-null cell holds a JSON array or object.
/// Each such column becomes a derived table named after it, with one row per
/// element: the parent's id under the id column, then `<column>_<field>` for
/// each field of an object element, or `<column>` for a scalar element.
#[derive(Debug, Clone)]
pub struct Flattener {
    id_column: String,
    unwrap: IndexMap<String, String>,
}

impl Flattener {
    pub fn new(id_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            unwrap: IndexMap::new(),
        }
    }

    /// For `column`, take the list stored under `key` of a wrapper object
    /// (`emissionsList → emissionsInfo`).
    pub fn with_unwrap(mut self, column: impl Into<String>, key: impl Into<String>) -> Self {
        self.unwrap.insert(column.into(), key.into());
        self
    }

    pub fn with_unwraps(mut self, unwrap: &IndexMap<String, String>) -> Self {
        self.unwrap
            .extend(unwrap.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Names of the nested columns of `dataset`.
    pub fn nested_columns(dataset: &Dataset) -> Vec<String> {
        dataset
            .columns
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                let mut cells = dataset.column_values(*index).filter(|c| !c.is_null()).peekable();
                cells.peek().is_some() && cells.all(|c| matches!(c, Cell::Nested(_)))
            })
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Remove every nested column from `dataset` and return the derived
    /// tables, in column order.
    pub fn flatten(&self, dataset: &mut Dataset) -> Vec<Dataset> {
        let ids: Vec<Cell> = match dataset.column_index(&self.id_column) {
            Some(index) => dataset.column_values(index).cloned().collect(),
            None => vec![Cell::Null; dataset.row_count()],
        };

        Self::nested_columns(dataset)
            .into_iter()
            .filter(|column| *column != self.id_column)
            .filter_map(|column| {
                let cells = dataset.remove_column(&column)?;
                let derived = self.derive(&column, &ids, cells);
                debug!(
                    column = %column,
                    rows = derived.row_count(),
                    "flattened nested column"
                );
                Some(derived)
            })
            .collect()
    }

    fn derive(&self, column: &str, ids: &[Cell], cells: Vec<Cell>) -> Dataset {
        let mut derived = Dataset::new(column);
        derived.ensure_column(&self.id_column);

        for (id, cell) in ids.iter().zip(cells) {
            let Cell::Nested(value) = cell else {
                continue;
            };
            for element in self.elements(column, value) {
                let mut row: IndexMap<String, Cell> = IndexMap::new();
                row.insert(self.id_column.clone(), id.clone());
                match element {
                    Value::Object(fields) => {
                        for (field, value) in &fields {
                            row.insert(format!("{}_{}", column, field), Cell::from_json(value));
                        }
                    }
                    scalar => {
                        row.insert(column.to_string(), Cell::from_json(&scalar));
                    }
                }
                derived.push_record(row);
            }
        }
        derived
    }

    fn elements(&self, column: &str, value: Value) -> Vec<Value> {
        let value = match (self.unwrap.get(column), value) {
            (Some(key), Value::Object(mut wrapper)) => match wrapper.remove(key) {
                Some(inner) => inner,
                None => Value::Object(wrapper),
            },
            (_, value) => value,
        };
        match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }
}
