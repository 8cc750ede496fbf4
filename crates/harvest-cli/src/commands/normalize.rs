//! Normalize command - apply a type descriptor to a raw file.

use std::path::PathBuf;

use colored::Colorize;
use harvest::{Normalizer, NormalizerConfig, OutputAggregator, SourceId, TypeDescriptor};

use super::{CommandResult, read_input, write_datasets};
use crate::cli::DelimiterChoice;

pub fn run(
    file: PathBuf,
    descriptor: PathBuf,
    source: Option<SourceId>,
    output: PathBuf,
    delimiter: DelimiterChoice,
    verbose: bool,
) -> CommandResult {
    let (dataset, format) = read_input(&file, delimiter)?;
    let descriptor = TypeDescriptor::load(&descriptor)?;
    let config = source
        .map(|s| s.normalizer())
        .unwrap_or_else(NormalizerConfig::default);

    println!(
        "{} {} with descriptor {}",
        "Normalizing".cyan().bold(),
        file.display().to_string().white(),
        descriptor.name.white()
    );

    let normalized = Normalizer::new(config).normalize(&dataset, &descriptor);
    let report = &normalized.report;

    println!(
        "Coerced {} columns, {} left as is, {} nulls cleansed, {} duplicates removed",
        report.coerced.len().to_string().white().bold(),
        report.failed.len().to_string().yellow(),
        report.nulls_cleansed,
        report.duplicates_removed
    );
    if verbose {
        for (column, reason) in &report.failed {
            println!("  {} {}: {}", "!".yellow(), column, reason);
        }
        for column in &report.missing {
            println!("  {} {} not in data", "-".blue(), column);
        }
    }

    let mut out = OutputAggregator::new();
    out.add_dataset(normalized.table);
    out.extend(normalized.derived);
    let processed = out.into_output();

    let written = write_datasets(&output, &processed, format, false)?;
    for path in &written {
        println!("{} {}", "Saved".green().bold(), path.display());
    }
    Ok(())
}
