//! Tabular datasets and their delimited-text representation.

mod cell;
mod dataset;
mod delimited;

pub use cell::Cell;
pub use dataset::Dataset;
pub use delimited::{
    detect_delimiter, read_delimited, read_path, write_delimited, write_path, DelimitedFormat,
};
