//! Per-entity detail fetching and assembly into tables.

use futures::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::fetch::{Endpoint, FetchOutcome, Fetcher, Keys};
use crate::table::{Cell, Dataset};

use super::pager::Record;
use super::taxonomy::EntityReference;

/// One resource fetched per entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Dataset name of the resource ("mpg_summary", ...).
    pub name: String,
    pub endpoint: Endpoint,
    /// Key whose value is the actual payload (`Results`, ...).
    #[serde(default)]
    pub unwrap: Option<String>,
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            unwrap: None,
        }
    }

    pub fn with_unwrap(mut self, key: impl Into<String>) -> Self {
        self.unwrap = Some(key.into());
        self
    }

    /// Rows carried by a payload: a list yields one row per object, an object
    /// yields one row. `None` when the unwrap key is missing or the payload is
    /// not tabular.
    pub fn rows(&self, payload: Value) -> Option<Vec<Record>> {
        let payload = match &self.unwrap {
            Some(key) => match payload {
                Value::Object(mut map) => map.remove(key)?,
                _ => return None,
            },
            None => payload,
        };

        match payload {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Object(map) => Some(vec![map]),
            _ => None,
        }
    }
}

/// Everything fetched for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub reference: EntityReference,
    /// Rows of the primary resource; `None` when the primary fetch failed.
    pub primary: Option<Vec<Record>>,
    /// Rows of each secondary resource, by name; `None` when absent.
    pub resources: IndexMap<String, Option<Vec<Record>>>,
}

impl EntityRecord {
    /// Whether the named secondary resource returned at least one row.
    pub fn has(&self, resource: &str) -> bool {
        matches!(self.resources.get(resource), Some(Some(rows)) if !rows.is_empty())
    }
}

/// Fetches a primary resource and any number of secondary resources for
/// each entity, all concurrently.
#[derive(Clone)]
pub struct DetailAggregator {
    fetcher: Fetcher,
    primary: ResourceSpec,
    secondaries: Vec<ResourceSpec>,
    base_keys: Keys,
    reference_keys: bool,
}

impl DetailAggregator {
    pub fn new(fetcher: Fetcher, primary: ResourceSpec) -> Self {
        Self {
            fetcher,
            primary,
            secondaries: Vec::new(),
            base_keys: Keys::new(),
            reference_keys: false,
        }
    }

    pub fn with_secondary(mut self, resource: ResourceSpec) -> Self {
        self.secondaries.push(resource);
        self
    }

    pub fn with_base_keys(mut self, keys: Keys) -> Self {
        self.base_keys = keys;
        self
    }

    /// Copy the ancestor keys of each reference into the primary table.
    pub fn with_reference_keys(mut self, enabled: bool) -> Self {
        self.reference_keys = enabled;
        self
    }

    pub fn secondaries(&self) -> &[ResourceSpec] {
        &self.secondaries
    }

    /// Fetch every resource of one entity.
    pub async fn fetch_record(&self, reference: &EntityReference) -> EntityRecord {
        let mut keys = self.base_keys.clone();
        keys.extend(reference.keys.iter().map(|(k, v)| (k.clone(), v.clone())));

        let (primary, secondaries) = futures::join!(
            self.fetch_resource(&self.primary, &keys),
            join_all(self.secondaries.iter().map(|r| self.fetch_resource(r, &keys)))
        );

        if primary.is_none() {
            warn!(
                id = %reference.id,
                label = reference.label.as_deref().unwrap_or(""),
                "primary detail unavailable"
            );
        }

        EntityRecord {
            reference: reference.clone(),
            primary,
            resources: self
                .secondaries
                .iter()
                .map(|r| r.name.clone())
                .zip(secondaries)
                .collect(),
        }
    }

    async fn fetch_resource(&self, resource: &ResourceSpec, keys: &Keys) -> Option<Vec<Record>> {
        match self.fetcher.fetch_endpoint(&resource.endpoint, keys).await {
            FetchOutcome::Json(payload) => {
                let rows = resource.rows(payload);
                if rows.is_none() {
                    debug!(resource = %resource.name, "payload has no rows");
                }
                rows
            }
            FetchOutcome::Empty | FetchOutcome::Failed => None,
        }
    }

    /// Fetch all entities. Records come back in reference order.
    pub async fn aggregate(&self, references: &[EntityReference]) -> Vec<EntityRecord> {
        info!(entities = references.len(), "fetching details");
        join_all(references.iter().map(|r| self.fetch_record(r))).await
    }

    /// Turn records into the primary dataset `name` followed by one dataset
    /// per secondary resource.
    ///
    /// Every record contributes at least one primary row; a record whose
    /// primary fetch failed contributes a row holding only its id (and keys).
    /// Each primary row carries a `has_<resource>` flag per secondary.
    /// Secondary rows carry the entity id as their first column.
    pub fn assemble(&self, name: &str, records: &[EntityRecord]) -> Vec<Dataset> {
        let mut primary = Dataset::new(name);
        let mut secondaries: Vec<Dataset> = self
            .secondaries
            .iter()
            .map(|r| Dataset::new(r.name.as_str()))
            .collect();

        for record in records {
            let reference = &record.reference;
            let mut head: IndexMap<String, Cell> = IndexMap::new();
            if self.reference_keys {
                for (key, value) in reference.ancestors() {
                    head.insert(key.clone(), Cell::Text(value.clone()));
                }
            }
            head.insert(reference.id_key.clone(), Cell::Text(reference.id.clone()));

            let flags: Vec<(String, Cell)> = self
                .secondaries
                .iter()
                .map(|r| (format!("has_{}", r.name), Cell::Bool(record.has(&r.name))))
                .collect();

            let rows = record.primary.as_deref().unwrap_or_default();
            if rows.is_empty() {
                let mut row = head.clone();
                row.extend(flags.iter().cloned());
                primary.push_record(row);
            }
            for fields in rows {
                let mut row = head.clone();
                row.extend(fields.iter().map(|(k, v)| (k.clone(), Cell::from_json(v))));
                row.extend(flags.iter().cloned());
                primary.push_record(row);
            }

            for (dataset, resource) in secondaries.iter_mut().zip(&self.secondaries) {
                let Some(Some(rows)) = record.resources.get(&resource.name) else {
                    continue;
                };
                for fields in rows {
                    let mut row: IndexMap<String, Cell> = IndexMap::new();
                    row.insert(reference.id_key.clone(), Cell::Text(reference.id.clone()));
                    row.extend(fields.iter().map(|(k, v)| (k.clone(), Cell::from_json(v))));
                    dataset.push_record(row);
                }
            }
        }

        let mut datasets = vec![primary];
        datasets.extend(secondaries);
        datasets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference(id: &str) -> EntityReference {
        let keys: Keys = [("year", "2024"), ("vehicle_id", id)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EntityReference::from_keys(keys).unwrap()
    }

    fn object(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unwrap_list_and_singleton() {
        let spec = ResourceSpec::new("detail", Endpoint::new("https://x", "/d"))
            .with_unwrap("yourMpgDriverVehicle");

        let list = spec.rows(json!({"yourMpgDriverVehicle": [{"a": 1}, {"a": 2}]}));
        assert_eq!(list.map(|r| r.len()), Some(2));

        let single = spec.rows(json!({"yourMpgDriverVehicle": {"a": 1}}));
        assert_eq!(single.map(|r| r.len()), Some(1));

        assert_eq!(spec.rows(json!({"other": 1})), None);
    }

    #[test]
    fn test_assemble_failed_primary_keeps_id_row() {
        let fetcher = Fetcher::new(
            std::sync::Arc::new(crate::fetch::MockTransport::new()),
            &crate::fetch::FetchConfig::default(),
        );
        let aggregator = DetailAggregator::new(
            fetcher,
            ResourceSpec::new("fuel", Endpoint::new("https://x", "/{vehicle_id}")),
        )
        .with_secondary(ResourceSpec::new("mpg_summary", Endpoint::new("https://x", "/s")));

        let records = vec![
            EntityRecord {
                reference: reference("1"),
                primary: Some(vec![object(json!({"make": "Acme", "city08": 21}))]),
                resources: [("mpg_summary".to_string(), Some(vec![object(json!({"avgMpg": 30.5}))]))]
                    .into_iter()
                    .collect(),
            },
            EntityRecord {
                reference: reference("2"),
                primary: None,
                resources: [("mpg_summary".to_string(), None)].into_iter().collect(),
            },
        ];

        let datasets = aggregator.assemble("fuel", &records);
        let fuel = &datasets[0];
        assert_eq!(fuel.columns, vec!["vehicle_id", "make", "city08", "has_mpg_summary"]);
        assert_eq!(fuel.row_count(), 2);
        assert_eq!(fuel.value(1, "vehicle_id"), Some(&Cell::Text("2".into())));
        assert_eq!(fuel.value(1, "make"), Some(&Cell::Null));
        assert_eq!(fuel.value(1, "has_mpg_summary"), Some(&Cell::Bool(false)));
        assert_eq!(fuel.value(0, "has_mpg_summary"), Some(&Cell::Bool(true)));

        let summary = &datasets[1];
        assert_eq!(summary.name, "mpg_summary");
        assert_eq!(summary.columns, vec!["vehicle_id", "avgMpg"]);
        assert_eq!(summary.row_count(), 1);
    }
}
