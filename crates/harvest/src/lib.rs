//! Harvest: rate-limited extraction and schema-driven normalization of
//! vehicle, fuel economy, safety and fueling-station data APIs.
//!
//! A harvest walks an upstream taxonomy (year → make → model → vehicle) or
//! pages through a result list, fetches per-entity details, infers a type
//! descriptor for every dataset and normalizes the data against it.
//!
//! # Core Principles
//!
//! - **Bounded**: every request goes through one admission gate and backs
//!   off when rate limited
//! - **Partial results**: a failed branch, page or resource is logged and
//!   skipped; only an unreachable root aborts a source
//! - **Recorded types**: descriptors are stored as JSON and reused, so a
//!   later run keeps earlier type decisions
//!
//! # Example
//!
//! ```no_run
//! use harvest::{HarvestConfig, Harvester, SourceId};
//!
//! # async fn run() -> harvest::Result<()> {
//! let harvester = Harvester::new(HarvestConfig::default().from_env())?;
//! let harvest = harvester.run(SourceId::FuelEconomy).await?;
//!
//! for (name, dataset) in &harvest.processed {
//!     println!("{}: {} rows", name, dataset.row_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod schema;
pub mod sources;
pub mod table;

mod harvester;

pub use crate::harvester::{Harvest, HarvestConfig, Harvester};
pub use error::{HarvestError, Result};
pub use fetch::{FetchConfig, Fetcher, RetryPolicy};
pub use normalize::{Normalized, Normalizer, NormalizerConfig};
pub use output::{DatasetMap, OutputAggregator};
pub use schema::{ColumnKind, SchemaInferencer, TypeDescriptor};
pub use sources::{Source, SourceId};
pub use table::{Cell, Dataset, DelimitedFormat};
