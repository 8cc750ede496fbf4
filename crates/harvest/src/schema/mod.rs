//! Column kinds, type descriptors and their inference.

mod descriptor;
mod inference;
mod types;

pub use descriptor::{ColumnDescriptor, KindChange, SchemaDrift, TypeDescriptor};
pub use inference::{DEFAULT_BOOLEAN_OVERRIDES, SchemaInferencer};
pub use types::{ColumnKind, parse_bool_literal, parse_datetime, parse_float, parse_int};
