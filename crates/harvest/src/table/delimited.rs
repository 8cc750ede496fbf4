//! Delimited text reading and writing with an explicit delimiter.
//!
//! Taxonomy sources are written comma-separated, the station source
//! pipe-separated with every field quoted. The delimiter is always chosen by
//! the caller; [`detect_delimiter`] is available for files of unknown origin.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::error::{HarvestError, Result};

use super::cell::Cell;
use super::dataset::Dataset;

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b',', b'|', b'\t', b';'];

/// Options for delimited I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedFormat {
    pub delimiter: u8,
    pub quote: u8,
    /// Quote every field on write (the station files need this because
    /// addresses and notes routinely contain the delimiter).
    pub quote_all: bool,
}

impl DelimitedFormat {
    /// Comma-separated, minimal quoting.
    pub fn comma() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            quote_all: false,
        }
    }

    /// Pipe-separated, every field quoted.
    pub fn pipe() -> Self {
        Self {
            delimiter: b'|',
            quote: b'"',
            quote_all: true,
        }
    }

    /// Any delimiter, minimal quoting.
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            ..Self::comma()
        }
    }
}

impl Default for DelimitedFormat {
    fn default() -> Self {
        Self::comma()
    }
}

/// Read a dataset from delimited text. Every field becomes [`Cell::from_text`].
pub fn read_delimited(
    reader: impl Read,
    name: impl Into<String>,
    format: DelimitedFormat,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .quote(format.quote)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(HarvestError::EmptyData("No columns found".to_string()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row: Vec<Cell> = record.iter().map(Cell::from_text).collect();
        row.truncate(headers.len());
        rows.push(row);
    }

    Ok(Dataset::with_rows(name, headers, rows))
}

/// Read a dataset from a file. The dataset is named after the file stem.
pub fn read_path(path: impl AsRef<Path>, format: DelimitedFormat) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| HarvestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_delimited(file, name, format)
}

/// Write a dataset as delimited text with a header row.
pub fn write_delimited(writer: impl Write, dataset: &Dataset, format: DelimitedFormat) -> Result<()> {
    let style = if format.quote_all {
        csv::QuoteStyle::Always
    } else {
        csv::QuoteStyle::Necessary
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter)
        .quote(format.quote)
        .quote_style(style)
        .from_writer(writer);

    writer.write_record(&dataset.columns)?;
    for row in &dataset.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush().map_err(|e| HarvestError::Io {
        path: dataset.name.clone().into(),
        source: e,
    })?;
    Ok(())
}

/// Write a dataset to a file, creating parent directories as needed.
pub fn write_path(path: impl AsRef<Path>, dataset: &Dataset, format: DelimitedFormat) -> Result<()> {
    let path = path.as_ref();
    let io_err = |e| HarvestError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let file = File::create(path).map_err(io_err)?;
    write_delimited(file, dataset, format)
}

/// Guess the delimiter of a file from its first lines.
///
/// A delimiter wins when it appears the same (non-zero) number of times on
/// every sampled line; ties go to the more frequent one.
pub fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    let lines: Vec<String> = BufReader::new(bytes)
        .lines()
        .take(10)
        .map_while(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return Err(HarvestError::EmptyData("No lines to analyze".to_string()));
    }

    let mut best = (b',', 0usize);
    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines.iter().map(|l| count_unquoted(l, delim)).collect();
        let first = counts[0];
        if first == 0 {
            continue;
        }
        let score = if counts.iter().all(|&c| c == first) {
            first * 1000
        } else {
            first
        };
        if score > best.1 {
            best = (delim, score);
        }
    }

    Ok(best.0)
}

/// Count delimiter occurrences in a line, respecting quotes.
fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    line.bytes()
        .filter(|&b| {
            if b == b'"' {
                in_quotes = !in_quotes;
            }
            b == delimiter && !in_quotes
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(b"a,b,c\n1,2,3\n4,5,6").unwrap(), b',');
        assert_eq!(detect_delimiter(b"\"a\"|\"b\"\n\"1,5\"|\"2\"").unwrap(), b'|');
    }

    #[test]
    fn test_read_delimited() {
        let data = "id|name|connectors\n5|\"Main St\"|\"[{\"\"id\"\":10}]\"\n6||\n";
        let dataset = read_delimited(data.as_bytes(), "stations", DelimitedFormat::pipe()).unwrap();

        assert_eq!(dataset.columns, vec!["id", "name", "connectors"]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.value(0, "id"), Some(&Cell::Text("5".into())));
        assert_eq!(dataset.value(0, "connectors"), Some(&Cell::Nested(json!([{"id": 10}]))));
        assert_eq!(dataset.value(1, "name"), Some(&Cell::Null));
    }

    #[test]
    fn test_write_honors_delimiter() {
        let dataset = Dataset::with_rows(
            "t",
            vec!["a".into(), "b".into()],
            vec![vec![Cell::Int(1), Cell::Text("x".into())]],
        );

        let mut comma = Vec::new();
        write_delimited(&mut comma, &dataset, DelimitedFormat::comma()).unwrap();
        assert_eq!(String::from_utf8(comma).unwrap(), "a,b\n1,x\n");

        let mut pipe = Vec::new();
        write_delimited(&mut pipe, &dataset, DelimitedFormat::pipe()).unwrap();
        assert_eq!(String::from_utf8(pipe).unwrap(), "\"a\"|\"b\"\n\"1\"|\"x\"\n");
    }
}
