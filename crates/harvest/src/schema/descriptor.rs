//! Type descriptors: the per-dataset column → kind mapping, and its
//! persistence as JSON.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{HarvestError, Result};

use super::types::ColumnKind;

/// Kind and example value of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub dtype: ColumnKind,
    #[serde(default)]
    pub example: Value,
}

impl ColumnDescriptor {
    pub fn new(dtype: ColumnKind, example: Value) -> Self {
        Self { dtype, example }
    }
}

/// Column name → kind for one logical dataset.
///
/// On disk a descriptor is a single-key JSON object,
/// `{"<name>": {"<column>": {"dtype": "...", "example": ...}}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub columns: IndexMap<String, ColumnDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, dtype: ColumnKind, example: Value) -> Self {
        self.insert(name, dtype, example);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, dtype: ColumnKind, example: Value) {
        self.columns
            .insert(name.into(), ColumnDescriptor::new(dtype, example));
    }

    pub fn kind(&self, column: &str) -> Option<ColumnKind> {
        self.columns.get(column).map(|c| c.dtype)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns of the given kind, in descriptor order.
    pub fn columns_of(&self, kind: ColumnKind) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(move |(_, c)| c.dtype == kind)
            .map(|(name, _)| name.as_str())
    }

    /// The descriptor as its JSON document.
    pub fn to_json(&self) -> Value {
        let columns = serde_json::to_value(&self.columns).unwrap_or(Value::Null);
        let mut document = serde_json::Map::new();
        document.insert(self.name.clone(), columns);
        Value::Object(document)
    }

    /// Read a descriptor from its JSON document.
    ///
    /// When `name` is given the document must contain that key; otherwise the
    /// document must contain exactly one.
    pub fn from_json(document: &Value, name: Option<&str>) -> Result<Self> {
        let Value::Object(map) = document else {
            return Err(HarvestError::Persistence(
                "descriptor document is not a JSON object".to_string(),
            ));
        };

        let (key, columns) = match name {
            Some(name) => map
                .get_key_value(name)
                .ok_or_else(|| HarvestError::Persistence(format!("no descriptor named '{}'", name)))?,
            None if map.len() == 1 => map.iter().next().ok_or_else(|| {
                HarvestError::Persistence("descriptor document is empty".to_string())
            })?,
            None => {
                return Err(HarvestError::Persistence(format!(
                    "expected one descriptor, found {}",
                    map.len()
                )));
            }
        };

        Ok(Self {
            name: key.clone(),
            columns: serde_json::from_value(columns.clone())?,
        })
    }

    /// Save the descriptor to a JSON file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    HarvestError::Persistence(format!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = File::create(path).map_err(|e| {
            HarvestError::Persistence(format!("Failed to create file '{}': {}", path.display(), e))
        })?;

        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_json()).map_err(|e| {
            HarvestError::Persistence(format!("Failed to serialize descriptor: {}", e))
        })?;

        Ok(())
    }

    /// Load a descriptor from a JSON file holding exactly one descriptor.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_named(path, None)
    }

    /// Load the descriptor called `name` (or the only one) from a JSON file.
    pub fn load_named(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| {
            HarvestError::Persistence(format!("Failed to open file '{}': {}", path.display(), e))
        })?;

        let document: Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            HarvestError::Persistence(format!("Failed to parse descriptor: {}", e))
        })?;

        Self::from_json(&document, name)
    }

    /// Default file location: `<dir>/<name>.json`.
    pub fn path_in(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(format!("{}.json", self.name))
    }

    /// SHA-256 over column names and kinds, in order. Examples do not
    /// contribute, so re-inferring over fresh data keeps the fingerprint
    /// unless the shape changed.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for (name, column) in &self.columns {
            hasher.update([0u8]);
            hasher.update(name.as_bytes());
            hasher.update([1u8]);
            hasher.update(column.dtype.as_str().as_bytes());
        }
        hex(&hasher.finalize())
    }

    /// Compare against a newer descriptor for the same dataset.
    pub fn drift(&self, newer: &TypeDescriptor) -> SchemaDrift {
        let added = newer
            .columns
            .keys()
            .filter(|name| !self.columns.contains_key(*name))
            .cloned()
            .collect();
        let removed = self
            .columns
            .keys()
            .filter(|name| !newer.columns.contains_key(*name))
            .cloned()
            .collect();
        let changed = self
            .columns
            .iter()
            .filter_map(|(name, old)| {
                let new = newer.columns.get(name)?;
                (new.dtype != old.dtype).then(|| KindChange {
                    column: name.clone(),
                    from: old.dtype,
                    to: new.dtype,
                })
            })
            .collect();

        SchemaDrift {
            added,
            removed,
            changed,
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A column whose kind differs between two descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindChange {
    pub column: String,
    pub from: ColumnKind,
    pub to: ColumnKind,
}

/// Differences between two descriptors of the same dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDrift {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<KindChange>,
}

impl SchemaDrift {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new("fuel")
            .with_column("vehicle_id", ColumnKind::Int, json!(47001))
            .with_column("cylDeact", ColumnKind::Boolean, json!("N"))
            .with_column("createdOn", ColumnKind::Datetime, json!("2024-01-01"))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schemas").join("fuel.json");

        descriptor().save(&path).unwrap();
        let loaded = TypeDescriptor::load(&path).unwrap();

        assert_eq!(loaded, descriptor());
    }

    #[test]
    fn test_document_shape() {
        let document = descriptor().to_json();
        assert_eq!(document["fuel"]["cylDeact"]["dtype"], json!("boolean"));
        assert_eq!(document["fuel"]["vehicle_id"]["example"], json!(47001));
    }

    #[test]
    fn test_from_json_requires_name_when_ambiguous() {
        let document = json!({"a": {}, "b": {}});
        assert!(TypeDescriptor::from_json(&document, None).is_err());
        let b = TypeDescriptor::from_json(&document, Some("b")).unwrap();
        assert_eq!(b.name, "b");
    }

    #[test]
    fn test_fingerprint_ignores_examples() {
        let mut other = descriptor();
        other.insert("vehicle_id", ColumnKind::Int, json!(1));
        assert_eq!(descriptor().fingerprint(), other.fingerprint());

        other.insert("vehicle_id", ColumnKind::String, json!(1));
        assert_ne!(descriptor().fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_drift() {
        let newer = TypeDescriptor::new("fuel")
            .with_column("vehicle_id", ColumnKind::String, json!("47001"))
            .with_column("cylDeact", ColumnKind::Boolean, json!("N"))
            .with_column("mpgData", ColumnKind::Boolean, json!("Y"));

        let drift = descriptor().drift(&newer);
        assert_eq!(drift.added, vec!["mpgData"]);
        assert_eq!(drift.removed, vec!["createdOn"]);
        assert_eq!(drift.changed.len(), 1);
        assert_eq!(drift.changed[0].column, "vehicle_id");
        assert!(descriptor().drift(&descriptor()).is_empty());
    }
}
