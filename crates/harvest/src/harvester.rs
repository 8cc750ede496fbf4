//! Main Harvester struct and public API.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HarvestError, Result};
use crate::extract::{DetailAggregator, PaginatedCollector, TaxonomyWalker};
use crate::fetch::{FetchConfig, Fetcher, Transport};
use crate::normalize::{NormalizeReport, Normalizer};
use crate::output::{DatasetMap, OutputAggregator};
use crate::schema::{SchemaInferencer, TypeDescriptor};
use crate::sources::{self, NREL_API_KEY_VAR, PaginatedSource, Source, SourceId, TaxonomyLimits, TaxonomySource};
use crate::table::Dataset;

/// Configuration for a harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub fetch: FetchConfig,
    pub limits: TaxonomyLimits,
    /// Records per station page.
    pub page_size: usize,
    /// NREL API key; read from `NREL_API_KEY` by [`HarvestConfig::from_env`].
    #[serde(skip_serializing)]
    pub nrel_api_key: Option<String>,
    pub station_filters: IndexMap<String, String>,
    /// Directory of type descriptors. Existing descriptors are reused and
    /// missing ones are inferred and saved there.
    pub descriptor_dir: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            limits: TaxonomyLimits::default(),
            page_size: 50,
            nrel_api_key: None,
            station_filters: sources::default_station_filters(),
            descriptor_dir: None,
        }
    }
}

impl HarvestConfig {
    /// Load a configuration from a JSON file. Missing fields keep their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| HarvestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            HarvestError::Config(format!("Failed to parse config '{}': {}", path.display(), e))
        })
    }

    /// Fill the NREL API key from the environment when it is not set.
    pub fn from_env(mut self) -> Self {
        if self.nrel_api_key.is_none() {
            self.nrel_api_key = std::env::var(NREL_API_KEY_VAR).ok().filter(|k| !k.is_empty());
        }
        self
    }

    pub fn with_num_years(mut self, num_years: Option<usize>) -> Self {
        self.limits.num_years = num_years;
        self
    }

    pub fn with_makes_per_year(mut self, makes: Option<usize>) -> Self {
        self.limits.makes_per_year = makes;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch.concurrency = concurrency;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.nrel_api_key = Some(key.into());
        self
    }

    pub fn with_descriptor_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.descriptor_dir = Some(dir.into());
        self
    }
}

/// Everything produced for one source.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub source: SourceId,
    /// Datasets as extracted, before normalization.
    pub raw: DatasetMap,
    pub descriptors: IndexMap<String, TypeDescriptor>,
    /// Normalized datasets followed by their derived tables.
    pub processed: DatasetMap,
    pub reports: IndexMap<String, NormalizeReport>,
}

/// The harvest engine: extraction, schema handling and normalization for
/// the catalogued sources, all sharing one rate-limited fetcher.
pub struct Harvester {
    config: HarvestConfig,
    fetcher: Fetcher,
    inferencer: SchemaInferencer,
}

impl Harvester {
    /// Create a harvester over the real network.
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let fetcher = Fetcher::http(&config.fetch)?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Create a harvester over a custom transport.
    pub fn with_transport(config: HarvestConfig, transport: Arc<dyn Transport>) -> Self {
        let fetcher = Fetcher::new(transport, &config.fetch);
        Self::with_fetcher(config, fetcher)
    }

    fn with_fetcher(config: HarvestConfig, fetcher: Fetcher) -> Self {
        Self {
            config,
            fetcher,
            inferencer: SchemaInferencer::new(),
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Catalog entry for `id`, configured from this harvester's settings.
    pub fn source(&self, id: SourceId) -> Result<Source> {
        let limits = &self.config.limits;
        Ok(match id {
            SourceId::FuelEconomy => Source::Taxonomy(sources::fuel_economy(limits)),
            SourceId::SafetyRatings => Source::Taxonomy(sources::safety_ratings(limits)),
            SourceId::Recalls => Source::Taxonomy(sources::recalls(limits)),
            SourceId::Stations => {
                let key = self.config.nrel_api_key.as_deref().ok_or_else(|| {
                    HarvestError::Config(format!("{} environment variable not set", NREL_API_KEY_VAR))
                })?;
                Source::Paginated(sources::stations(
                    key,
                    self.config.page_size,
                    &self.config.station_filters,
                ))
            }
        })
    }

    /// Extract, type and normalize one source.
    pub async fn run(&self, id: SourceId) -> Result<Harvest> {
        let source = self.source(id)?;
        let raw = self.extract(&source).await?;
        let descriptors = self.descriptors(&raw)?;
        let (processed, reports) = self.normalize(&source, &raw, &descriptors);

        info!(
            source = ?id,
            raw = raw.len(),
            processed = processed.len(),
            "harvest complete"
        );

        Ok(Harvest {
            source: id,
            raw,
            descriptors,
            processed,
            reports,
        })
    }

    /// Fetch the raw datasets of a source. Nested columns are split off
    /// into raw tables of their own, named after the column.
    pub async fn extract(&self, source: &Source) -> Result<DatasetMap> {
        let raw = match source {
            Source::Taxonomy(s) => self.extract_taxonomy(s).await?,
            Source::Paginated(s) => self.extract_paginated(s).await?,
        };
        Ok(split_nested(source, raw))
    }

    async fn extract_taxonomy(&self, source: &TaxonomySource) -> Result<DatasetMap> {
        let references = TaxonomyWalker::new(self.fetcher.clone(), source.levels.clone())
            .walk()
            .await?;
        info!(source = ?source.id, entities = references.len(), "taxonomy walked");

        let aggregator = source
            .secondaries
            .iter()
            .cloned()
            .fold(
                DetailAggregator::new(self.fetcher.clone(), source.primary.clone()),
                DetailAggregator::with_secondary,
            )
            .with_reference_keys(source.reference_keys);

        let records = aggregator.aggregate(&references).await;
        let mut output = OutputAggregator::new();
        output.extend(aggregator.assemble(source.id.dataset(), &records));
        Ok(output.into_output())
    }

    async fn extract_paginated(&self, source: &PaginatedSource) -> Result<DatasetMap> {
        let records = PaginatedCollector::new(
            self.fetcher.clone(),
            source.endpoint.clone(),
            source.results_key.as_str(),
            source.page_size,
        )
        .with_keys(source.keys.clone())
        .collect_all()
        .await?;

        let mut output = OutputAggregator::new();
        output.add(
            source.id.dataset(),
            Some(Dataset::from_json_records(source.id.dataset(), &records)),
        );
        Ok(output.into_output())
    }

    /// Type descriptors for every dataset of `raw`.
    ///
    /// With a descriptor directory, a stored descriptor wins over inference
    /// so that later runs keep the recorded types; drift is logged.
    pub fn descriptors(&self, raw: &DatasetMap) -> Result<IndexMap<String, TypeDescriptor>> {
        let mut descriptors = IndexMap::new();
        for (name, dataset) in raw {
            let inferred = self.inferencer.infer(name, dataset);
            let descriptor = match &self.config.descriptor_dir {
                Some(dir) => {
                    let path = inferred.path_in(dir);
                    if path.exists() {
                        let stored = TypeDescriptor::load_named(&path, Some(name))?;
                        let drift = stored.drift(&inferred);
                        if !drift.is_empty() {
                            warn!(
                                dataset = %name,
                                added = drift.added.len(),
                                removed = drift.removed.len(),
                                changed = drift.changed.len(),
                                "schema drift against stored descriptor"
                            );
                        }
                        stored
                    } else {
                        inferred.save(&path)?;
                        debug!(dataset = %name, path = %path.display(), "descriptor saved");
                        inferred
                    }
                }
                None => inferred,
            };
            descriptors.insert(name.clone(), descriptor);
        }
        Ok(descriptors)
    }

    /// Normalize each raw dataset with its descriptor. Datasets without a
    /// descriptor are normalized against an empty one. Tables split off
    /// during normalization use the descriptor of the same name when there
    /// is one.
    pub fn normalize(
        &self,
        source: &Source,
        raw: &DatasetMap,
        descriptors: &IndexMap<String, TypeDescriptor>,
    ) -> (DatasetMap, IndexMap<String, NormalizeReport>) {
        let normalizer = Normalizer::new(source.normalizer().clone());
        let mut output = OutputAggregator::new();
        let mut reports = IndexMap::new();

        for (name, dataset) in raw {
            let empty = TypeDescriptor::new(name.as_str());
            let descriptor = descriptors.get(name).unwrap_or(&empty);
            let normalized = normalizer.normalize_with(dataset, descriptor, descriptors);
            output.add_dataset(normalized.table);
            output.extend(normalized.derived);
            reports.insert(name.clone(), normalized.report);
        }

        (output.into_output(), reports)
    }
}

fn split_nested(source: &Source, raw: DatasetMap) -> DatasetMap {
    let normalizer = Normalizer::new(source.normalizer().clone());
    let mut output = OutputAggregator::new();
    for dataset in raw.into_values() {
        let (table, derived) = normalizer.split(&dataset);
        output.add_dataset(table);
        output.extend(derived);
    }
    output.into_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MockTransport;
    use crate::table::Cell;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn stations_transport() -> MockTransport {
        let first = "https://developer.nrel.gov/api/alt-fuel-stations/v1.json?api_key=K&limit=2&offset=0";
        let second = "https://developer.nrel.gov/api/alt-fuel-stations/v1.json?api_key=K&limit=2&offset=2";
        MockTransport::new()
            .respond_json(
                first,
                json!({"total_results": 3, "fuel_stations": [
                    {"id": 1, "station_name": "A", "ev_connectors": ["J1772"]},
                    {"id": 2, "station_name": "unknown", "ev_connectors": ["J1772", "CHADEMO"]}
                ]}),
            )
            .respond_json(
                second,
                json!({"total_results": 3, "fuel_stations": [
                    {"id": 1, "station_name": "A", "ev_connectors": ["J1772"]}
                ]}),
            )
    }

    fn stations_config() -> HarvestConfig {
        HarvestConfig {
            page_size: 2,
            station_filters: IndexMap::new(),
            ..HarvestConfig::default()
        }
        .with_api_key("K")
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stations() {
        let harvester = Harvester::with_transport(stations_config(), Arc::new(stations_transport()));
        let harvest = harvester.run(SourceId::Stations).await.unwrap();

        assert_eq!(harvest.raw.keys().collect::<Vec<_>>(), vec!["stations", "ev_connectors"]);
        assert_eq!(harvest.raw["stations"].row_count(), 3);
        assert_eq!(harvest.raw["ev_connectors"].row_count(), 4);
        let stations = &harvest.processed["stations"];
        assert_eq!(stations.columns, vec!["id", "stationName"]);
        assert_eq!(stations.row_count(), 2);
        assert_eq!(stations.value(1, "stationName"), Some(&Cell::Null));

        let connectors = &harvest.processed["ev_connectors"];
        assert_eq!(connectors.columns, vec!["id", "evConnectors"]);
        assert_eq!(connectors.row_count(), 3);
        assert_eq!(harvest.reports["stations"].duplicates_removed, 1);
    }

    #[test]
    fn test_stations_require_api_key() {
        let harvester = Harvester::with_transport(
            HarvestConfig::default(),
            Arc::new(MockTransport::new()),
        );
        assert!(matches!(
            harvester.source(SourceId::Stations),
            Err(HarvestError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_descriptor_wins() {
        let dir = tempfile::tempdir().unwrap();
        let stored = TypeDescriptor::new("stations")
            .with_column("id", crate::schema::ColumnKind::String, json!("1"));
        stored.save(stored.path_in(dir.path())).unwrap();

        let config = stations_config().with_descriptor_dir(dir.path());
        let harvester = Harvester::with_transport(config, Arc::new(stations_transport()));
        let harvest = harvester.run(SourceId::Stations).await.unwrap();

        assert_eq!(harvest.descriptors["stations"], stored);
        assert_eq!(
            harvest.processed["stations"].value(0, "id"),
            Some(&Cell::Text("1".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_tables_get_descriptors() {
        let first = "https://developer.nrel.gov/api/alt-fuel-stations/v1.json?api_key=K&limit=2&offset=0";
        let transport = MockTransport::new().respond_json(
            first,
            json!({"total_results": 1, "fuel_stations": [
                {"id": 5, "connectors": [
                    {"power_kw": 7.123456, "since": "2024-01-05", "ok": "Yes"},
                    {"power_kw": 50, "since": "2023-11-30", "ok": "No"}
                ]}
            ]}),
        );
        let dir = tempfile::tempdir().unwrap();
        let stored = TypeDescriptor::new("connectors")
            .with_column("connectors_ok", crate::schema::ColumnKind::Boolean, json!("Yes"));
        stored.save(stored.path_in(dir.path())).unwrap();

        let config = stations_config().with_descriptor_dir(dir.path());
        let harvester = Harvester::with_transport(config, Arc::new(transport));
        let harvest = harvester.run(SourceId::Stations).await.unwrap();

        assert_eq!(harvest.descriptors["connectors"], stored);
        assert!(TypeDescriptor::new("stations").path_in(dir.path()).exists());

        let connectors = &harvest.processed["connectors"];
        assert_eq!(connectors.value(0, "connectorsOk_bool"), Some(&Cell::Bool(true)));
        assert_eq!(connectors.value(1, "connectorsOk_bool"), Some(&Cell::Bool(false)));
        assert_eq!(connectors.value(0, "connectorsPowerKw"), Some(&Cell::Float(7.123456)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_tables_are_typed_by_inference() {
        let first = "https://developer.nrel.gov/api/alt-fuel-stations/v1.json?api_key=K&limit=2&offset=0";
        let transport = MockTransport::new().respond_json(
            first,
            json!({"total_results": 1, "fuel_stations": [
                {"id": 5, "connectors": [{"power_kw": 7.123456, "since": "2024-01-05"}]}
            ]}),
        );
        let harvester = Harvester::with_transport(stations_config(), Arc::new(transport));
        let harvest = harvester.run(SourceId::Stations).await.unwrap();

        assert_eq!(
            harvest.descriptors["connectors"].kind("connectors_since"),
            Some(crate::schema::ColumnKind::Datetime)
        );
        let connectors = &harvest.processed["connectors"];
        assert_eq!(connectors.value(0, "connectorsPowerKw"), Some(&Cell::Float(7.123)));
        assert!(matches!(connectors.value(0, "connectorsSince"), Some(Cell::DateTime(_))));
    }

    #[test]
    fn test_config_load_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"page_size": 25, "limits": {{"num_years": 3}}}}"#).unwrap();

        let config = HarvestConfig::load(file.path()).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.limits.num_years, Some(3));
        assert_eq!(config.fetch.concurrency, 10);
        assert!(config.station_filters.contains_key("fuel_type"));
        assert_eq!(config.limits.excluded_years, vec!["9999"]);
    }

    #[test]
    fn test_partial_limits_keep_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"limits": {{"makes_per_year": 2}}}}"#).unwrap();

        let config = HarvestConfig::load(file.path()).unwrap();
        assert_eq!(config.limits.makes_per_year, Some(2));
        assert_eq!(config.limits.num_years, Some(1));
        assert_eq!(config.limits.excluded_years, vec!["9999"]);
    }
}
