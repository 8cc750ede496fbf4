//! Error types for the harvest library.
//!
//! Most failures inside an extraction or normalization run are contained at
//! the smallest scope that can continue (one fetch, one column) and surface as
//! absent values plus a log line. The variants here cover the cases that do
//! abort: an unreachable taxonomy root or first page, configuration problems,
//! and I/O on the persisted artifacts.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harvest operations.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The first level of a taxonomy walk could not be fetched.
    #[error("Taxonomy root unavailable: {0}")]
    RootUnavailable(String),

    /// The first page of a paginated collection could not be fetched.
    #[error("First page unavailable: {0}")]
    FirstPageUnavailable(String),

    /// An endpoint template could not be rendered into a URL.
    #[error("Invalid endpoint '{endpoint}': {message}")]
    Endpoint { endpoint: String, message: String },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Empty file or no data to process.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Type descriptor could not be saved or loaded.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request never produced a response (connection, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;
