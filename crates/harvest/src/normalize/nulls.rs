//! Null cleansing.

use std::collections::HashSet;

use crate::table::{Cell, Dataset};

/// Text values treated as missing by default (compared case-insensitively).
pub const DEFAULT_NULL_SENTINELS: &[&str] = &["Not Rated", "unknown"];

/// Replaces blank and sentinel text with nulls.
#[derive(Debug, Clone)]
pub struct NullCleanser {
    sentinels: HashSet<String>,
}

impl NullCleanser {
    pub fn new<S: AsRef<str>>(sentinels: &[S]) -> Self {
        Self {
            sentinels: sentinels
                .iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    /// Whether a cell counts as missing.
    pub fn is_null_like(&self, cell: &Cell) -> bool {
        match cell {
            Cell::Null => true,
            Cell::Text(text) => {
                let trimmed = text.trim();
                trimmed.is_empty() || self.sentinels.contains(&trimmed.to_lowercase())
            }
            _ => false,
        }
    }

    /// Null out every null-like cell of every column. Returns how many cells
    /// changed.
    pub fn cleanse(&self, dataset: &mut Dataset) -> usize {
        let mut changed = 0;
        for row in &mut dataset.rows {
            for cell in row.iter_mut() {
                if !cell.is_null() && self.is_null_like(cell) {
                    *cell = Cell::Null;
                    changed += 1;
                }
            }
        }
        changed
    }
}

impl Default for NullCleanser {
    fn default() -> Self {
        Self::new(DEFAULT_NULL_SENTINELS)
    }
}
