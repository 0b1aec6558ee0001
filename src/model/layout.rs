//! Weight layout of a prunable model.

use crate::error::{PodarError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One prunable operation and the size of its weight tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpLayout {
    /// Fully qualified op name (e.g. `encoder.layers.0.fc1`).
    pub name: String,
    /// Op type (e.g. `Linear`, `Conv2d`).
    pub op_type: String,
    /// Number of weight elements.
    pub numel: u64,
}

impl OpLayout {
    /// Create a new op layout.
    pub fn new(name: impl Into<String>, op_type: impl Into<String>, numel: u64) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            numel,
        }
    }
}

/// Ordered weight layout of a model.
///
/// An original model and its compact counterparts share op names; a compact
/// model may report fewer elements per op after structural pruning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLayout {
    ops: Vec<OpLayout>,
}

impl ModelLayout {
    /// Create a layout from ops in model order.
    pub fn new(ops: Vec<OpLayout>) -> Self {
        Self { ops }
    }

    /// Append an op.
    pub fn with_op(mut self, name: impl Into<String>, op_type: impl Into<String>, numel: u64) -> Self {
        self.ops.push(OpLayout::new(name, op_type, numel));
        self
    }

    /// Load a layout from a JSON or YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_document(path.as_ref())
    }

    /// Ops in model order.
    pub fn ops(&self) -> &[OpLayout] {
        &self.ops
    }

    /// Look up an op by name.
    pub fn get(&self, name: &str) -> Option<&OpLayout> {
        self.ops.iter().find(|op| op.name == name)
    }

    /// Weight element count of an op, if present.
    pub fn numel(&self, name: &str) -> Option<u64> {
        self.get(name).map(|op| op.numel)
    }

    /// Check whether the layout contains an op.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the layout has no ops.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Total weight elements across all ops.
    pub fn total_numel(&self) -> u64 {
        self.ops.iter().map(|op| op.numel).sum()
    }
}

/// Read a JSON or YAML document, picking the parser by file extension.
pub(crate) fn load_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PodarError::io(format!("Failed to read {}", path.display()), e))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&content)?),
        _ => Ok(serde_json::from_str(&content)?),
    }
}
