//! Harvest CLI - vehicle data extraction and normalization.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "harvest=debug" } else { "harvest=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Extract {
            source,
            output,
            stamp,
            fetch,
        } => commands::extract::run(source.into(), output, stamp, fetch, cli.verbose).await,

        Commands::Schema {
            file,
            output,
            name,
            delimiter,
        } => commands::schema::run(file, output, name, delimiter, cli.verbose),

        Commands::Normalize {
            file,
            descriptor,
            source,
            output,
            delimiter,
        } => commands::normalize::run(
            file,
            descriptor,
            source.map(Into::into),
            output,
            delimiter,
            cli.verbose,
        ),

        Commands::Run {
            source,
            output,
            json,
            fetch,
        } => commands::run::run(source.into(), output, json, fetch, cli.verbose).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
