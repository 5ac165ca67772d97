//! Artifact descriptors - the identity of an artifact before it exists on disk

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// One entry of a sequential architecture.
///
/// Serialized as `{"kind": ..., "parameters": {...}}`; Keras-style
/// `{"class_name": ..., "config": {...}}` is accepted on input. Parameter key
/// order does not matter; the fingerprint sorts keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Layer type name (e.g., "Dense", "Rescaling")
    #[serde(alias = "class_name")]
    pub kind: String,
    /// Layer hyperparameters
    #[serde(default, alias = "config")]
    pub parameters: Map<String, Value>,
}

impl LayerDescriptor {
    /// Create a layer with no parameters.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            parameters: Map::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Structure, training configuration and data shape of an artifact.
///
/// Layer order is significant. The two mappings are compared and
/// fingerprinted without regard to key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    structure: Vec<LayerDescriptor>,
    training_config: Map<String, Value>,
    data_descriptor: Map<String, Value>,
}

impl ArtifactDescriptor {
    /// Create a descriptor from already-JSON parts.
    #[must_use]
    pub const fn new(
        structure: Vec<LayerDescriptor>,
        training_config: Map<String, Value>,
        data_descriptor: Map<String, Value>,
    ) -> Self {
        Self {
            structure,
            training_config,
            data_descriptor,
        }
    }

    /// Create a descriptor from any serializable config and data values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if either value fails to serialize
    /// (e.g. a map with non-string keys) or does not serialize to a mapping.
    pub fn from_serializable<C, D>(
        structure: Vec<LayerDescriptor>,
        training_config: &C,
        data_descriptor: &D,
    ) -> Result<Self>
    where
        C: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        Ok(Self {
            structure,
            training_config: to_mapping("training_config", training_config)?,
            data_descriptor: to_mapping("data_descriptor", data_descriptor)?,
        })
    }

    /// Get the ordered layer structure.
    #[must_use]
    pub fn structure(&self) -> &[LayerDescriptor] {
        &self.structure
    }

    /// Get the training hyperparameters.
    #[must_use]
    pub const fn training_config(&self) -> &Map<String, Value> {
        &self.training_config
    }

    /// Get the input domain description.
    #[must_use]
    pub const fn data_descriptor(&self) -> &Map<String, Value> {
        &self.data_descriptor
    }
}

fn to_mapping<T: Serialize + ?Sized>(part: &str, value: &T) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(value)
        .map_err(|e| Error::Serialization(format!("{part}: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Serialization(format!(
            "{part}: expected a mapping, got {}",
            kind_name(&other)
        ))),
    }
}

const fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Compile and fit settings of a training stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Optimizer identifier
    pub optimizer: String,
    /// Loss function identifier
    pub loss: String,
    /// Metric identifiers
    pub metrics: Vec<String>,
    /// Number of passes over the training split
    pub epochs: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            optimizer: "adam".to_string(),
            loss: "sparse_categorical_crossentropy".to_string(),
            metrics: vec!["accuracy".to_string()],
            epochs: 5,
        }
    }
}

/// Shape of the input domain a model is trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDescriptor {
    /// Number of output classes
    pub class_count: u32,
    /// Input tensor shape, without the batch dimension
    pub input_shape: Vec<u32>,
}

impl DataDescriptor {
    /// Create a data descriptor.
    #[must_use]
    pub const fn new(class_count: u32, input_shape: Vec<u32>) -> Self {
        Self {
            class_count,
            input_shape,
        }
    }
}
