//! Exact duplicate row removal.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::table::{Cell, Dataset};

/// Content key of a row. Cells are hashed with their variant tag so that
/// `Int(1)` and `Text("1")` differ.
fn row_key(row: &[Cell]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for cell in row {
        hasher.update([cell.tag()]);
        let text = cell.to_string();
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().into()
}

/// Drop rows equal to an earlier row. Returns how many were removed.
pub fn dedupe_rows(dataset: &mut Dataset) -> usize {
    let before = dataset.rows.len();
    let mut seen = HashSet::with_capacity(before);
    dataset.rows.retain(|row| seen.insert(row_key(row)));
    before - dataset.rows.len()
}
