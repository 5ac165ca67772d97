//! Metadata Record - one entry of the metadata index

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::{ArtifactDescriptor, LayerDescriptor};

/// Metadata Record describes one cached artifact.
///
/// The fingerprint is the key of the record in the index document and is
/// not repeated inside it. Layers are kept as written, so records in any
/// layer shape (`kind`/`parameters` or `class_name`/`config`) survive a
/// rewrite of the document unchanged.
///
/// ## Document Format
///
/// ```text
/// {
///   "<fingerprint>": {
///     "layers": [...],
///     "model_config": {...},
///     "dataset_info": {...},
///     "path": "<cache_root>/<fingerprint>",
///     "created_at": "2026-10-16T09:30:00.123456Z"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataRecord {
    layers: Vec<Value>,
    #[serde(rename = "model_config")]
    training_config: Map<String, Value>,
    #[serde(rename = "dataset_info")]
    data_descriptor: Map<String, Value>,
    #[serde(rename = "path")]
    storage_path: PathBuf,
    #[serde(deserialize_with = "timestamp::deserialize")]
    created_at: DateTime<Utc>,
}

impl MetadataRecord {
    /// Create a new record for `descriptor` stored at `storage_path`.
    ///
    /// # Returns
    ///
    /// A new `MetadataRecord` with the current timestamp.
    #[must_use]
    pub fn new(descriptor: &ArtifactDescriptor, storage_path: impl Into<PathBuf>) -> Self {
        Self::builder(descriptor, storage_path).build()
    }

    /// Create a builder for constructing a record with optional fields.
    #[must_use]
    pub fn builder(
        descriptor: &ArtifactDescriptor,
        storage_path: impl Into<PathBuf>,
    ) -> MetadataRecordBuilder {
        MetadataRecordBuilder::new(descriptor, storage_path)
    }

    /// Get the layers exactly as recorded.
    #[must_use]
    pub fn layers(&self) -> &[Value] {
        &self.layers
    }

    /// Get the training configuration.
    #[must_use]
    pub const fn training_config(&self) -> &Map<String, Value> {
        &self.training_config
    }

    /// Get the data descriptor.
    #[must_use]
    pub const fn data_descriptor(&self) -> &Map<String, Value> {
        &self.data_descriptor
    }

    /// Get the artifact location recorded at commit time.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Rebuild the descriptor this record was created from.
    ///
    /// Returns `None` if a recorded layer is not a layer mapping.
    #[must_use]
    pub fn descriptor(&self) -> Option<ArtifactDescriptor> {
        let structure = self
            .layers
            .iter()
            .map(|layer| serde_json::from_value::<LayerDescriptor>(layer.clone()).ok())
            .collect::<Option<Vec<_>>>()?;
        Some(ArtifactDescriptor::new(
            structure,
            self.training_config.clone(),
            self.data_descriptor.clone(),
        ))
    }
}

/// Builder for `MetadataRecord`.
#[derive(Debug)]
pub struct MetadataRecordBuilder {
    descriptor: ArtifactDescriptor,
    storage_path: PathBuf,
    created_at: DateTime<Utc>,
}

impl MetadataRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(descriptor: &ArtifactDescriptor, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            descriptor: descriptor.clone(),
            storage_path: storage_path.into(),
            created_at: Utc::now(),
        }
    }

    /// Set a custom creation timestamp (useful for testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `MetadataRecord`.
    #[must_use]
    pub fn build(self) -> MetadataRecord {
        let layers = self
            .descriptor
            .structure()
            .iter()
            .map(|layer| {
                serde_json::json!({"kind": layer.kind, "parameters": layer.parameters})
            })
            .collect();
        MetadataRecord {
            layers,
            training_config: self.descriptor.training_config().clone(),
            data_descriptor: self.descriptor.data_descriptor().clone(),
            storage_path: self.storage_path,
            created_at: self.created_at,
        }
    }
}

/// `created_at` accepts RFC 3339 as well as epoch seconds, which older
/// index documents stored as a decimal string.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let parsed = match &raw {
            Value::String(s) => parse(s),
            Value::Number(n) => n.as_f64().and_then(from_epoch_secs),
            _ => None,
        };
        parsed.ok_or_else(|| serde::de::Error::custom(format!("invalid created_at: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        raw.trim().parse::<f64>().ok().and_then(from_epoch_secs)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
    }
}
