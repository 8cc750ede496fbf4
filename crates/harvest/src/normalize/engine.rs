//! The normalization pipeline: cleanse, flatten, coerce, rename, dedupe.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::schema::{SchemaInferencer, TypeDescriptor};
use crate::table::Dataset;

use super::coerce::{Coerced, CoercionOptions, coerce};
use super::dedupe::dedupe_rows;
use super::flatten::Flattener;
use super::nulls::{DEFAULT_NULL_SENTINELS, NullCleanser};
use super::rename::{normalize_name, rename_columns};

/// Normalizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Text values treated as null (case-insensitive), besides blanks.
    pub null_sentinels: Vec<String>,
    /// Decimal places kept by float columns.
    pub decimals: u32,
    /// Strict datetime layout; RFC 3339 and common date forms when unset.
    pub datetime_format: Option<String>,
    /// Parent id carried into derived tables.
    pub id_column: String,
    /// Nested column → wrapper key holding its list.
    pub unwrap: IndexMap<String, String>,
    /// Columns moved to the front of the table, by raw name.
    pub first_columns: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            null_sentinels: DEFAULT_NULL_SENTINELS.iter().map(|s| s.to_string()).collect(),
            decimals: 3,
            datetime_format: None,
            id_column: "id".to_string(),
            unwrap: IndexMap::new(),
            first_columns: Vec::new(),
        }
    }
}

impl NormalizerConfig {
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_unwrap(mut self, column: impl Into<String>, key: impl Into<String>) -> Self {
        self.unwrap.insert(column.into(), key.into());
        self
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = Some(format.into());
        self
    }

    pub fn with_first_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.first_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// What a normalization run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub nulls_cleansed: usize,
    /// Columns converted to their descriptor kind.
    pub coerced: Vec<String>,
    /// Columns left as they were, with the reason.
    pub failed: Vec<(String, String)>,
    /// Descriptor columns not present in the data.
    pub missing: Vec<String>,
    pub renamed: usize,
    pub duplicates_removed: usize,
    /// Reports of the derived tables, by table name.
    pub derived: IndexMap<String, NormalizeReport>,
}

/// A normalized table and the derived tables split off from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: Dataset,
    pub derived: Vec<Dataset>,
    pub report: NormalizeReport,
}

/// Applies a type descriptor to raw tabular data.
///
/// Every step works column by column; a column that cannot be processed is
/// logged and left alone.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    cleanser: NullCleanser,
    flattener: Flattener,
    inferencer: SchemaInferencer,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        let cleanser = NullCleanser::new(config.null_sentinels.as_slice());
        let flattener = Flattener::new(config.id_column.as_str()).with_unwraps(&config.unwrap);
        Self {
            config,
            cleanser,
            flattener,
            inferencer: SchemaInferencer::new(),
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize `raw` against `descriptor`. Derived tables are typed with
    /// an inferred descriptor.
    pub fn normalize(&self, raw: &Dataset, descriptor: &TypeDescriptor) -> Normalized {
        self.normalize_with(raw, descriptor, &IndexMap::new())
    }

    /// Normalize `raw` against `descriptor`, typing each derived table with
    /// the entry of `derived_descriptors` named after it, or with an
    /// inferred descriptor when there is none.
    pub fn normalize_with(
        &self,
        raw: &Dataset,
        descriptor: &TypeDescriptor,
        derived_descriptors: &IndexMap<String, TypeDescriptor>,
    ) -> Normalized {
        let mut table = raw.clone();
        let mut report = NormalizeReport {
            nulls_cleansed: self.cleanser.cleanse(&mut table),
            ..NormalizeReport::default()
        };

        let derived: Vec<Dataset> = self
            .flattener_for(&table)
            .flatten(&mut table)
            .into_iter()
            .map(|mut d| {
                let mut derived_report = NormalizeReport {
                    nulls_cleansed: self.cleanser.cleanse(&mut d),
                    ..NormalizeReport::default()
                };
                match derived_descriptors.get(&d.name) {
                    Some(descriptor) => self.coerce_all(&mut d, descriptor, &mut derived_report),
                    None => {
                        let inferred = self.inferencer.infer(&d.name, &d);
                        self.coerce_all(&mut d, &inferred, &mut derived_report);
                    }
                }
                derived_report.renamed = rename_columns(&mut d);
                derived_report.duplicates_removed = dedupe_rows(&mut d);
                report.derived.insert(d.name.clone(), derived_report);
                d
            })
            .collect();

        self.coerce_all(&mut table, descriptor, &mut report);
        report.renamed = rename_columns(&mut table);
        report.duplicates_removed = dedupe_rows(&mut table);
        if !self.config.first_columns.is_empty() {
            let first: Vec<String> = self
                .config
                .first_columns
                .iter()
                .map(|c| normalize_name(c))
                .collect();
            table.move_to_front(&first);
        }

        info!(
            dataset = %table.name,
            rows = table.row_count(),
            columns = table.column_count(),
            derived = derived.len(),
            duplicates = report.duplicates_removed,
            "normalized"
        );

        Normalized {
            table,
            derived,
            report,
        }
    }

    /// Split the nested columns of `raw` into derived tables without any
    /// other processing. The derived tables keep their raw column names.
    pub fn split(&self, raw: &Dataset) -> (Dataset, Vec<Dataset>) {
        let mut table = raw.clone();
        let derived = self.flattener_for(&table).flatten(&mut table);
        (table, derived)
    }

    fn flattener_for(&self, table: &Dataset) -> Flattener {
        match resolve_column(table, &self.config.id_column) {
            Some(id) if id != self.config.id_column => {
                Flattener::new(id).with_unwraps(&self.config.unwrap)
            }
            _ => self.flattener.clone(),
        }
    }

    fn coerce_all(&self, table: &mut Dataset, descriptor: &TypeDescriptor, report: &mut NormalizeReport) {
        let options = CoercionOptions {
            decimals: self.config.decimals,
            datetime_format: self.config.datetime_format.clone(),
        };

        for (name, column) in &descriptor.columns {
            let Some(actual) = resolve_column(table, name) else {
                debug!(column = %name, "descriptor column not in data");
                report.missing.push(name.clone());
                continue;
            };
            let Some(cells) = table.column_cells(&actual) else {
                continue;
            };

            match coerce(&actual, &cells, column.dtype, &options) {
                Ok(Coerced::Replace(converted)) => {
                    table.set_column(&actual, converted);
                    report.coerced.push(actual);
                }
                Ok(Coerced::Companion { name, cells }) => {
                    table.set_column(&name, cells);
                    report.coerced.push(actual);
                }
                Err(reason) => {
                    warn!(
                        column = %actual,
                        kind = %column.dtype,
                        "could not convert column: {}",
                        reason
                    );
                    report.failed.push((actual, reason));
                }
            }
        }
    }
}

/// Find `name` in the dataset, or its renamed form when the data has
/// already been normalized once.
fn resolve_column(dataset: &Dataset, name: &str) -> Option<String> {
    if dataset.column_index(name).is_some() {
        return Some(name.to_string());
    }
    let renamed = normalize_name(name);
    dataset.column_index(&renamed).map(|_| renamed)
}
