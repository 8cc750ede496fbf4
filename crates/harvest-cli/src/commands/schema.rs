//! Schema command - infer a type descriptor from a raw file.

use std::path::PathBuf;

use colored::Colorize;
use harvest::SchemaInferencer;

use super::{CommandResult, read_input};
use crate::cli::DelimiterChoice;

pub fn run(
    file: PathBuf,
    output: Option<PathBuf>,
    name: Option<String>,
    delimiter: DelimiterChoice,
    verbose: bool,
) -> CommandResult {
    let (dataset, _) = read_input(&file, delimiter)?;
    let name = name.unwrap_or_else(|| dataset.name.clone());

    println!(
        "{} {} ({} rows, {} columns)",
        "Inferring".cyan().bold(),
        file.display().to_string().white(),
        dataset.row_count(),
        dataset.column_count()
    );

    let descriptor = SchemaInferencer::new().infer(&name, &dataset);

    if verbose {
        println!();
        println!("{}", "Columns:".yellow().bold());
        for (column, descriptor) in &descriptor.columns {
            println!("  {:30} {:10} {}", column, descriptor.dtype, descriptor.example);
        }
        println!();
    }

    let output_path = output.unwrap_or_else(|| {
        let mut p = file.clone();
        p.set_file_name(format!("{}.schema.json", name));
        p
    });
    descriptor.save(&output_path)?;

    println!(
        "{} {} (fingerprint {})",
        "Saved to".green().bold(),
        output_path.display().to_string().white(),
        &descriptor.fingerprint()[..12]
    );
    Ok(())
}
