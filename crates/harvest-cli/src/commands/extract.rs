//! Extract command - fetch raw datasets from an upstream source.

use std::path::PathBuf;

use colored::Colorize;
use harvest::{Harvester, SourceId};

use super::{CommandResult, harvest_config, write_datasets};
use crate::cli::FetchArgs;

pub async fn run(
    source: SourceId,
    output: PathBuf,
    stamp: bool,
    fetch: FetchArgs,
    verbose: bool,
) -> CommandResult {
    let config = harvest_config(&fetch)?;
    if verbose {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    println!(
        "{} {}",
        "Extracting".cyan().bold(),
        source.dataset().white()
    );

    let harvester = Harvester::new(config)?;
    let raw = harvester.extract(&harvester.source(source)?).await?;

    if raw.is_empty() {
        println!("{}", "No data returned.".yellow());
        return Ok(());
    }

    let written = write_datasets(&output, &raw, source.format(), stamp)?;
    for ((name, dataset), path) in raw.iter().zip(&written) {
        println!(
            "  {:16} {:>8} rows  {}",
            name,
            dataset.row_count().to_string().white().bold(),
            path.display()
        );
    }

    println!();
    println!(
        "{} {}",
        "Saved to".green().bold(),
        output.display().to_string().white()
    );
    Ok(())
}
