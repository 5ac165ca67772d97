//! Sequential model artifact persisted as `model.json`

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::Artifact;
use crate::descriptor::LayerDescriptor;

const MODEL_FILE: &str = "model.json";

/// A sequential model: ordered layers plus named weight tensors.
///
/// Weight tensors are stored flat; their shapes are implied by the layer
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialModel {
    name: String,
    layers: Vec<LayerDescriptor>,
    #[serde(default)]
    weights: BTreeMap<String, Vec<f32>>,
}

impl SequentialModel {
    /// Create a model with no weights.
    #[must_use]
    pub fn new(name: impl Into<String>, layers: Vec<LayerDescriptor>) -> Self {
        Self {
            name: name.into(),
            layers,
            weights: BTreeMap::new(),
        }
    }

    /// Attach a weight tensor.
    #[must_use]
    pub fn with_weights(mut self, key: impl Into<String>, values: Vec<f32>) -> Self {
        self.weights.insert(key.into(), values);
        self
    }

    /// Get the model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the layer stack.
    #[must_use]
    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    /// Get the weight tensors by name.
    #[must_use]
    pub const fn weights(&self) -> &BTreeMap<String, Vec<f32>> {
        &self.weights
    }

    /// Total number of scalar weights.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.weights.values().map(Vec::len).sum()
    }
}

impl Artifact for SequentialModel {
    fn write_to(&self, dir: &Path) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        fs::write(dir.join(MODEL_FILE), bytes)
    }

    fn read_from(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(MODEL_FILE);
        let bytes =
            fs::read(&path).with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Cannot decode model from '{}'", path.display()))
    }
}
