//! Hierarchical discovery of entity ids (year → make → model → id).

use std::cmp::Ordering;

use futures::future::join_all;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HarvestError, Result};
use crate::fetch::{Endpoint, FetchOutcome, Fetcher, Keys};

use super::menu::{Choice, menu_values, results_values};

/// How child values are laid out in a level's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseShape {
    /// `{"menuItem": [...]}` or `{"menuItem": {...}}`.
    Menu,
    /// `{"<key>": [{"<field>": .., "<label>": ..}]}`.
    Results {
        key: String,
        field: String,
        #[serde(default)]
        label: Option<String>,
    },
}

/// Ordering applied to the children of one parent before limiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOrder {
    #[default]
    AsReturned,
    Ascending,
    Descending,
}

impl LevelOrder {
    fn apply(self, choices: &mut [Choice]) {
        match self {
            LevelOrder::AsReturned => {}
            LevelOrder::Ascending => choices.sort_by(|a, b| compare_values(&a.value, &b.value)),
            LevelOrder::Descending => choices.sort_by(|a, b| compare_values(&b.value, &a.value)),
        }
    }
}

/// Numeric comparison when both values are integers, text otherwise.
fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// One level of a taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyLevel {
    /// Name under which this level's value is passed to deeper levels.
    pub key: String,
    pub endpoint: Endpoint,
    pub shape: ResponseShape,
    #[serde(default)]
    pub order: LevelOrder,
    /// Maximum children explored per parent, applied after ordering.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Values never explored (e.g. the `9999` placeholder year).
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl TaxonomyLevel {
    /// A level answered with a menu response.
    pub fn menu(key: impl Into<String>, endpoint: Endpoint) -> Self {
        Self::new(key, endpoint, ResponseShape::Menu)
    }

    /// A level answered with a results response.
    pub fn results(
        key: impl Into<String>,
        endpoint: Endpoint,
        results_key: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::new(
            key,
            endpoint,
            ResponseShape::Results {
                key: results_key.into(),
                field: field.into(),
                label: None,
            },
        )
    }

    fn new(key: impl Into<String>, endpoint: Endpoint, shape: ResponseShape) -> Self {
        Self {
            key: key.into(),
            endpoint,
            shape,
            order: LevelOrder::AsReturned,
            limit: None,
            exclude: Vec::new(),
        }
    }

    /// Read the label of each child from `field` (results shape only).
    pub fn with_label(mut self, field: impl Into<String>) -> Self {
        if let ResponseShape::Results { label, .. } = &mut self.shape {
            *label = Some(field.into());
        }
        self
    }

    pub fn with_order(mut self, order: LevelOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn excluding(mut self, value: impl Into<String>) -> Self {
        self.exclude.push(value.into());
        self
    }

    /// Children of one parent: parsed, deduplicated, ordered, filtered and limited.
    fn children(&self, payload: &serde_json::Value) -> Vec<Choice> {
        let parsed = match &self.shape {
            ResponseShape::Menu => menu_values(payload),
            ResponseShape::Results { key, field, label } => {
                results_values(payload, key, field, label.as_deref())
            }
        };

        let mut seen = IndexSet::new();
        let mut choices: Vec<Choice> = parsed
            .into_iter()
            .filter(|choice| seen.insert(choice.value.clone()))
            .collect();

        self.order.apply(&mut choices);
        choices.retain(|choice| !self.exclude.contains(&choice.value));
        if let Some(limit) = self.limit {
            choices.truncate(limit);
        }
        choices
    }
}

/// A position in the hierarchy: the keys accumulated on the way down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyNode {
    pub keys: Keys,
    pub label: Option<String>,
}

impl TaxonomyNode {
    fn child(&self, key: &str, choice: Choice) -> Self {
        let mut keys = self.keys.clone();
        keys.insert(key.to_string(), choice.value);
        Self {
            keys,
            label: choice.label,
        }
    }
}

/// A leaf of the hierarchy, identifying one entity to fetch in detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReference {
    /// The leaf value (vehicle id, model name, ...).
    pub id: String,
    /// Name of the leaf key; used as the id column of assembled tables.
    pub id_key: String,
    /// Every key from the root down to and including the leaf.
    pub keys: Keys,
    pub label: Option<String>,
}

impl EntityReference {
    /// Reference built directly from keys. The last key is the id.
    pub fn from_keys(keys: Keys) -> Option<Self> {
        let (id_key, id) = keys.last().map(|(k, v)| (k.clone(), v.clone()))?;
        Some(Self {
            id,
            id_key,
            keys,
            label: None,
        })
    }

    /// Ancestor keys, without the leaf.
    pub fn ancestors(&self) -> impl Iterator<Item = (&String, &String)> {
        self.keys.iter().filter(move |(k, _)| **k != self.id_key)
    }
}

/// Walks a configured hierarchy breadth-first.
///
/// All fetches of one level are issued together and awaited as a group
/// before the next level starts. Children keep their parents' order.
#[derive(Clone)]
pub struct TaxonomyWalker {
    fetcher: Fetcher,
    levels: Vec<TaxonomyLevel>,
    base_keys: Keys,
}

impl TaxonomyWalker {
    pub fn new(fetcher: Fetcher, levels: Vec<TaxonomyLevel>) -> Self {
        Self {
            fetcher,
            levels,
            base_keys: Keys::new(),
        }
    }

    /// Keys available to every level (API keys and the like). They are not
    /// part of the produced references.
    pub fn with_base_keys(mut self, keys: Keys) -> Self {
        self.base_keys = keys;
        self
    }

    pub fn levels(&self) -> &[TaxonomyLevel] {
        &self.levels
    }

    /// Descend every level and return the leaves.
    ///
    /// Fails only when the first level cannot be fetched. A failed branch
    /// below the root contributes no children.
    pub async fn walk(&self) -> Result<Vec<EntityReference>> {
        let Some(leaf) = self.levels.last() else {
            return Err(HarvestError::Config("taxonomy has no levels".to_string()));
        };

        let mut frontier = vec![TaxonomyNode::default()];
        for (depth, level) in self.levels.iter().enumerate() {
            frontier = self.expand(depth, level, &frontier).await?;
            info!(
                level = %level.key,
                nodes = frontier.len(),
                "taxonomy level expanded"
            );
            if frontier.is_empty() {
                break;
            }
        }

        Ok(frontier
            .into_iter()
            .filter_map(|node| {
                let id = node.keys.get(&leaf.key)?.clone();
                Some(EntityReference {
                    id,
                    id_key: leaf.key.clone(),
                    keys: node.keys,
                    label: node.label,
                })
            })
            .collect())
    }

    async fn expand(
        &self,
        depth: usize,
        level: &TaxonomyLevel,
        parents: &[TaxonomyNode],
    ) -> Result<Vec<TaxonomyNode>> {
        let outcomes = join_all(parents.iter().map(|parent| {
            let mut keys = self.base_keys.clone();
            keys.extend(parent.keys.iter().map(|(k, v)| (k.clone(), v.clone())));
            async move { self.fetcher.fetch_endpoint(&level.endpoint, &keys).await }
        }))
        .await;

        let mut children = Vec::new();
        for (parent, outcome) in parents.iter().zip(outcomes) {
            let payload = match outcome {
                FetchOutcome::Json(payload) => payload,
                FetchOutcome::Empty => {
                    debug!(level = %level.key, keys = ?parent.keys, "no children");
                    continue;
                }
                FetchOutcome::Failed if depth == 0 => {
                    return Err(HarvestError::RootUnavailable(format!(
                        "{}{}",
                        level.endpoint.base_url, level.endpoint.path
                    )));
                }
                FetchOutcome::Failed => {
                    warn!(level = %level.key, keys = ?parent.keys, "branch dropped");
                    continue;
                }
            };

            children.extend(
                level
                    .children(&payload)
                    .into_iter()
                    .map(|choice| parent.child(&level.key, choice)),
            );
        }
        Ok(children)
    }
}
