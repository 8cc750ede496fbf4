//! Row-major tabular datasets.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::cell::Cell;

/// A named table with a fixed column set.
///
/// Columns are the union of the field names observed for the dataset, in
/// first-seen order. Rows that lack a column hold [`Cell::Null`] there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Logical dataset name ("fuel", "stations", "connectors", ...).
    pub name: String,
    /// Column headers.
    pub columns: Vec<String>,
    /// Row data (row-major order, one cell per column).
    pub rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Create a dataset from headers and rows. Short rows are padded with nulls.
    pub fn with_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Build a dataset from JSON objects.
    pub fn from_json_records<'a>(
        name: impl Into<String>,
        records: impl IntoIterator<Item = &'a Map<String, Value>>,
    ) -> Self {
        let mut dataset = Self::new(name);
        for record in records {
            dataset.push_json(record);
        }
        dataset
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Get all values for a column by index.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| row.get(index).unwrap_or(&Cell::Null))
    }

    /// Get a column by name.
    pub fn column_by_name(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.column_values(index).collect())
    }

    /// Owned copy of a column's cells.
    pub fn column_cells(&self, name: &str) -> Option<Vec<Cell>> {
        let index = self.column_index(name)?;
        Some(self.column_values(index).cloned().collect())
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Get a cell by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.get(row, col)
    }

    /// Return the index of `name`, appending a null-filled column if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Cell::Null);
        }
        self.columns.len() - 1
    }

    /// Append a row given as column → cell pairs.
    pub fn push_record(&mut self, record: IndexMap<String, Cell>) {
        let indices: Vec<usize> = record.keys().map(|k| self.ensure_column(k)).collect();
        let mut row = vec![Cell::Null; self.columns.len()];
        for (index, cell) in indices.into_iter().zip(record.into_values()) {
            row[index] = cell;
        }
        self.rows.push(row);
    }

    /// Append a row from a JSON object.
    pub fn push_json(&mut self, record: &Map<String, Value>) {
        self.push_record(
            record
                .iter()
                .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                .collect(),
        );
    }

    /// Append all rows of `other`, widening the column set as needed.
    pub fn append(&mut self, other: Dataset) {
        let indices: Vec<usize> = other.columns.iter().map(|c| self.ensure_column(c)).collect();
        let width = self.columns.len();
        for source in other.rows {
            let mut row = vec![Cell::Null; width];
            for (index, cell) in indices.iter().zip(source) {
                row[*index] = cell;
            }
            self.rows.push(row);
        }
    }

    /// Remove a column and return its cells.
    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Cell>> {
        let index = self.column_index(name)?;
        self.columns.remove(index);
        Some(self.rows.iter_mut().map(|row| row.remove(index)).collect())
    }

    /// Replace the cells of an existing column, or append a new one.
    pub fn set_column(&mut self, name: &str, cells: Vec<Cell>) {
        let index = self.ensure_column(name);
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row[index] = cell;
        }
    }

    /// Move the named columns to the front, in the given order. Names not in
    /// the dataset are ignored; the other columns keep their order.
    pub fn move_to_front<S: AsRef<str>>(&mut self, names: &[S]) {
        let mut order: Vec<usize> = Vec::with_capacity(self.columns.len());
        for name in names {
            if let Some(index) = self.column_index(name.as_ref()) {
                if !order.contains(&index) {
                    order.push(index);
                }
            }
        }
        let rest: Vec<usize> = (0..self.columns.len())
            .filter(|i| !order.contains(i))
            .collect();
        order.extend(rest);

        self.columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = order.iter().map(|&i| row[i].clone()).collect();
        }
    }
}
