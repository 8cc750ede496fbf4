//! Column renaming: snake/kebab case to lower camelCase.

use indexmap::IndexMap;
use tracing::debug;

use crate::table::{Cell, Dataset};

use super::coerce::BOOL_SUFFIX;

/// Normalized form of a column name.
///
/// Names containing `_` or `-` are split on both and joined with each word
/// capitalised and the rest of the word lower-cased. Decoded
/// boolean columns keep their `_bool` suffix and only the stem is converted.
/// The first letter of the result is lower-cased.
pub fn normalize_name(name: &str) -> String {
    let renamed = match name.strip_suffix(BOOL_SUFFIX).map(camel_case) {
        Some(stem) if !stem.is_empty() => format!("{}{}", stem, BOOL_SUFFIX),
        _ => camel_case(name),
    };
    lower_first(&renamed)
}

fn camel_case(name: &str) -> String {
    if !name.contains('_') && !name.contains('-') {
        return name.to_string();
    }
    name.split(['_', '-']).map(capitalize).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rename every column of `dataset`. Columns that end up with the same name
/// are merged into the first of them, each row keeping its first non-null
/// value. Returns the number of columns whose name changed.
pub fn rename_columns(dataset: &mut Dataset) -> usize {
    let mut targets: IndexMap<String, Vec<usize>> = IndexMap::new();
    let mut changed = 0;
    for (index, column) in dataset.columns.iter().enumerate() {
        let renamed = normalize_name(column);
        if renamed != *column {
            changed += 1;
        }
        targets.entry(renamed).or_default().push(index);
    }

    if targets.len() == dataset.columns.len() {
        for (column, renamed) in dataset.columns.iter_mut().zip(targets.keys()) {
            *column = renamed.clone();
        }
        return changed;
    }

    for (name, sources) in targets.iter().filter(|(_, s)| s.len() > 1) {
        debug!(column = %name, merged = sources.len(), "coalescing columns");
    }

    let rows = dataset
        .rows
        .iter()
        .map(|row| {
            targets
                .values()
                .map(|sources| {
                    sources
                        .iter()
                        .filter_map(|i| row.get(*i))
                        .find(|cell| !cell.is_null())
                        .cloned()
                        .unwrap_or(Cell::Null)
                })
                .collect()
        })
        .collect();

    dataset.columns = targets.into_keys().collect();
    dataset.rows = rows;
    changed
}
