//! CLI command implementations.

pub mod extract;
pub mod normalize;
pub mod run;
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use harvest::table::{detect_delimiter, read_delimited, write_path};
use harvest::{Dataset, DatasetMap, DelimitedFormat, HarvestConfig};

use crate::cli::{DelimiterChoice, FetchArgs};

pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Configuration file (if any) overridden by command line flags, then the
/// environment for the API key.
pub fn harvest_config(args: &FetchArgs) -> CommandResult<HarvestConfig> {
    let mut config = match &args.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    if args.num_years.is_some() {
        config = config.with_num_years(args.num_years);
    }
    if args.makes.is_some() {
        config = config.with_makes_per_year(args.makes);
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(key) = &args.api_key {
        config = config.with_api_key(key.clone());
    }
    Ok(config.from_env())
}

/// `<name>.csv`, or `<name>_<YYYYMMDD>.csv` when stamped.
pub fn file_name(name: &str, stamp: bool) -> String {
    if stamp {
        format!("{}_{}.csv", name, Local::now().format("%Y%m%d"))
    } else {
        format!("{}.csv", name)
    }
}

/// Write every dataset to `dir`, one file each.
pub fn write_datasets(
    dir: &Path,
    datasets: &DatasetMap,
    format: DelimitedFormat,
    stamp: bool,
) -> CommandResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create directory '{}': {}", dir.display(), e))?;

    let mut written = Vec::with_capacity(datasets.len());
    for (name, dataset) in datasets {
        let path = dir.join(file_name(name, stamp));
        write_path(&path, dataset, format)?;
        written.push(path);
    }
    Ok(written)
}

/// Read a delimited input file, detecting the delimiter when asked to.
pub fn read_input(file: &Path, delimiter: DelimiterChoice) -> CommandResult<(Dataset, DelimitedFormat)> {
    if !file.exists() {
        return Err(format!("File not found: {}", file.display()).into());
    }
    let bytes = fs::read(file)?;
    let format = match delimiter.format() {
        Some(format) => format,
        None => match detect_delimiter(&bytes)? {
            b'|' => DelimitedFormat::pipe(),
            other => DelimitedFormat::with_delimiter(other),
        },
    };
    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let dataset = read_delimited(bytes.as_slice(), name, format)?;
    Ok((dataset, format))
}
