//! Run command - extract, type and normalize a source end to end.

use std::path::PathBuf;

use colored::Colorize;
use harvest::{DatasetMap, Harvester, SourceId};
use serde_json::{Map, Value, json};

use super::{CommandResult, harvest_config, write_datasets};
use crate::cli::FetchArgs;

pub async fn run(
    source: SourceId,
    output: PathBuf,
    json_output: bool,
    fetch: FetchArgs,
    verbose: bool,
) -> CommandResult {
    let config = harvest_config(&fetch)?.with_descriptor_dir(output.join("schemas"));

    if !json_output {
        println!(
            "{} {}",
            "Harvesting".cyan().bold(),
            source.dataset().white()
        );
    }

    let harvester = Harvester::new(config)?;
    let harvest = harvester.run(source).await?;

    let format = source.format();
    let raw_files = write_datasets(&output.join("raw"), &harvest.raw, format, true)?;
    let processed_files = write_datasets(&output.join("processed"), &harvest.processed, format, true)?;

    if json_output {
        let rows = |datasets: &DatasetMap| -> Map<String, Value> {
            datasets
                .iter()
                .map(|(name, d)| (name.clone(), Value::from(d.row_count())))
                .collect()
        };
        let fingerprints: Map<String, Value> = harvest
            .descriptors
            .iter()
            .map(|(name, d)| (name.clone(), Value::from(d.fingerprint())))
            .collect();
        let files: Vec<String> = raw_files
            .iter()
            .chain(&processed_files)
            .map(|p| p.display().to_string())
            .collect();

        let summary = json!({
            "source": source,
            "raw": rows(&harvest.raw),
            "processed": rows(&harvest.processed),
            "descriptors": fingerprints,
            "reports": harvest.reports,
            "files": files,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("{}", "Processed:".yellow().bold());
    for (name, dataset) in &harvest.processed {
        println!(
            "  {:20} {:>8} rows {:>4} columns",
            name,
            dataset.row_count().to_string().white().bold(),
            dataset.column_count()
        );
    }

    if verbose {
        println!();
        for (name, report) in &harvest.reports {
            println!(
                "  {}: {} coerced, {} failed, {} duplicates removed",
                name,
                report.coerced.len(),
                report.failed.len(),
                report.duplicates_removed
            );
        }
    }

    println!();
    println!(
        "{} {}",
        "Saved to".green().bold(),
        output.display().to_string().white()
    );
    Ok(())
}
