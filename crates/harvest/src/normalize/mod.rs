//! Schema-driven normalization of raw datasets.
//!
//! [`Normalizer::normalize`] runs, in order: null cleansing, flattening of
//! nested columns into derived tables, type coercion per the descriptor,
//! column renaming and duplicate removal.

mod coerce;
mod dedupe;
mod engine;
mod flatten;
mod nulls;
mod rename;

pub use coerce::{
    BOOL_SUFFIX, Coerced, CoercionOptions, coerce, to_boolean, to_datetime, to_float, to_int,
    to_string,
};
pub use dedupe::dedupe_rows;
pub use engine::{NormalizeReport, Normalized, Normalizer, NormalizerConfig};
pub use flatten::Flattener;
pub use nulls::{DEFAULT_NULL_SENTINELS, NullCleanser};
pub use rename::{normalize_name, rename_columns};
