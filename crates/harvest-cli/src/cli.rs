//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use harvest::{DelimitedFormat, SourceId};

/// Harvest: vehicle data extraction and normalization
#[derive(Parser)]
#[command(name = "harvest")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options shared by the commands that talk to the upstream services.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct FetchArgs {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Most recent model years to explore
    #[arg(long)]
    pub num_years: Option<usize>,

    /// Makes to explore per year
    #[arg(long)]
    pub makes: Option<usize>,

    /// Maximum simultaneous requests
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// NREL API key (default: NREL_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract raw datasets from an upstream source
    Extract {
        /// Source to extract
        #[arg(value_name = "SOURCE")]
        source: SourceChoice,

        /// Output directory for raw files
        #[arg(short, long, default_value = "data/raw")]
        output: PathBuf,

        /// Append today's date to file names
        #[arg(long)]
        stamp: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Infer a type descriptor from a delimited file
    Schema {
        /// Path to the raw data file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output path for the descriptor (default: <file>.schema.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dataset name (default: file stem)
        #[arg(long)]
        name: Option<String>,

        /// Field delimiter
        #[arg(short, long, default_value = "auto")]
        delimiter: DelimiterChoice,
    },

    /// Normalize a delimited file against a type descriptor
    Normalize {
        /// Path to the raw data file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Type descriptor JSON
        #[arg(short = 's', long, value_name = "DESCRIPTOR")]
        descriptor: PathBuf,

        /// Source whose normalization settings apply
        #[arg(long)]
        source: Option<SourceChoice>,

        /// Output directory for processed files
        #[arg(short, long, default_value = "data/processed")]
        output: PathBuf,

        /// Field delimiter
        #[arg(short, long, default_value = "auto")]
        delimiter: DelimiterChoice,
    },

    /// Extract, type and normalize a source in one go
    Run {
        /// Source to harvest
        #[arg(value_name = "SOURCE")]
        source: SourceChoice,

        /// Root output directory (raw/, schemas/, processed/)
        #[arg(short, long, default_value = "data")]
        output: PathBuf,

        /// Print a JSON summary instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceChoice {
    /// fueleconomy.gov vehicles and "your MPG" data
    Fuel,
    /// NHTSA 5-star safety ratings
    Ratings,
    /// NHTSA recalls
    Recalls,
    /// NREL alternative fuel stations (requires NREL_API_KEY)
    Stations,
}

impl From<SourceChoice> for SourceId {
    fn from(choice: SourceChoice) -> Self {
        match choice {
            SourceChoice::Fuel => SourceId::FuelEconomy,
            SourceChoice::Ratings => SourceId::SafetyRatings,
            SourceChoice::Recalls => SourceId::Recalls,
            SourceChoice::Stations => SourceId::Stations,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DelimiterChoice {
    /// Detect from the first lines of the file
    #[default]
    Auto,
    Comma,
    Pipe,
    Tab,
}

impl DelimiterChoice {
    /// The explicit format, or `None` for auto-detection.
    pub fn format(self) -> Option<DelimitedFormat> {
        match self {
            DelimiterChoice::Auto => None,
            DelimiterChoice::Comma => Some(DelimitedFormat::comma()),
            DelimiterChoice::Pipe => Some(DelimitedFormat::pipe()),
            DelimiterChoice::Tab => Some(DelimitedFormat::with_delimiter(b'\t')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["harvest", "run", "fuel", "--num-years", "2", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { source, fetch, .. } => {
                assert_eq!(source, SourceChoice::Fuel);
                assert_eq!(fetch.num_years, Some(2));
            }
            _ => panic!("expected run"),
        }
    }
}
