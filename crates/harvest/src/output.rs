//! Collection of named datasets into the final result map.

use indexmap::IndexMap;
use tracing::debug;

use crate::table::Dataset;

/// Datasets by name, in the order they were first produced.
pub type DatasetMap = IndexMap<String, Dataset>;

/// Gathers dataset parts under names.
///
/// Parts sharing a name are concatenated. A name whose parts are all absent
/// or all empty is left out of the output.
#[derive(Debug, Default)]
pub struct OutputAggregator {
    parts: IndexMap<String, Vec<Dataset>>,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one part under `name`; `None` stands for a part that could not
    /// be produced.
    pub fn add(&mut self, name: impl Into<String>, part: Option<Dataset>) {
        let entry = self.parts.entry(name.into()).or_default();
        if let Some(part) = part {
            entry.push(part);
        }
    }

    /// Add a dataset under its own name.
    pub fn add_dataset(&mut self, dataset: Dataset) {
        self.add(dataset.name.clone(), Some(dataset));
    }

    pub fn extend(&mut self, datasets: impl IntoIterator<Item = Dataset>) {
        for dataset in datasets {
            self.add_dataset(dataset);
        }
    }

    pub fn into_output(self) -> DatasetMap {
        let mut output = DatasetMap::new();
        for (name, parts) in self.parts {
            let mut parts = parts.into_iter().filter(|p| !p.is_empty());
            let Some(mut merged) = parts.next() else {
                debug!(dataset = %name, "no rows, omitted");
                continue;
            };
            for part in parts {
                merged.append(part);
            }
            merged.name = name.clone();
            output.insert(name, merged);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn part(name: &str, rows: &[i64]) -> Dataset {
        Dataset::with_rows(
            name,
            vec!["id".into()],
            rows.iter().map(|r| vec![Cell::Int(*r)]).collect(),
        )
    }

    #[test]
    fn test_parts_concatenate_in_order() {
        let mut agg = OutputAggregator::new();
        agg.add("fuel", Some(part("fuel", &[1, 2])));
        agg.add("mpg_summary", Some(part("mpg_summary", &[9])));
        agg.add("fuel", Some(part("fuel", &[3])));

        let out = agg.into_output();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["fuel", "mpg_summary"]);
        assert_eq!(out["fuel"].row_count(), 3);
        assert_eq!(out["fuel"].value(2, "id"), Some(&Cell::Int(3)));
    }

    #[test]
    fn test_absent_and_empty_names_are_omitted() {
        let mut agg = OutputAggregator::new();
        agg.add("missing", None);
        agg.add("empty", Some(Dataset::new("empty")));
        agg.add("kept", None);
        agg.add("kept", Some(part("kept", &[1])));

        let out = agg.into_output();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["kept"]);
    }
}
