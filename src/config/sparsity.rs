//! Canonical sparsity groups and exported config lists.

use serde::{Deserialize, Serialize};

/// A canonical config group: ops sharing one target sparsity.
///
/// After canonicalization every op belongs to exactly one group and
/// `total_sparsity` lies in `[0, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparsityConfig {
    /// Ops in this group.
    pub op_names: Vec<String>,
    /// Target fraction of the group's weight elements to prune.
    pub total_sparsity: f64,
}

impl SparsityConfig {
    /// Create a group.
    pub fn new<I, S>(op_names: I, total_sparsity: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            op_names: op_names.into_iter().map(Into::into).collect(),
            total_sparsity,
        }
    }

    /// Single-op record, the unit of an exported config list.
    pub fn single(op_name: impl Into<String>, total_sparsity: f64) -> Self {
        Self {
            op_names: vec![op_name.into()],
            total_sparsity,
        }
    }

    /// Check whether the group contains an op.
    pub fn contains(&self, op_name: &str) -> bool {
        self.op_names.iter().any(|name| name == op_name)
    }
}

/// Ordered per-op config list handed to the executor with each task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigList {
    entries: Vec<SparsityConfig>,
}

impl ConfigList {
    /// Create an empty config list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records.
    pub fn extend(&mut self, records: impl IntoIterator<Item = SparsityConfig>) {
        self.entries.extend(records);
    }

    /// Append one record.
    pub fn push(&mut self, record: SparsityConfig) {
        self.entries.push(record);
    }

    /// Records in order.
    pub fn entries(&self) -> &[SparsityConfig] {
        &self.entries
    }

    /// Mutable records in order.
    pub fn entries_mut(&mut self) -> &mut [SparsityConfig] {
        &mut self.entries
    }

    /// Sparsity assigned to an op, if present.
    pub fn sparsity_of(&self, op_name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.contains(op_name))
            .map(|entry| entry.total_sparsity)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<SparsityConfig> for ConfigList {
    fn from_iter<I: IntoIterator<Item = SparsityConfig>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
