//! User-facing sparsity config entries.

use serde::{Deserialize, Serialize};

/// One entry of the user's config list, before canonicalization.
///
/// An entry selects ops by type, exact name or name substring and gives
/// them either a per-layer sparsity (`sparsity` / `sparsity_per_layer`) or a
/// group-level `total_sparsity`. `exclude` entries remove their ops from
/// every earlier entry.
///
/// # Example
///
/// ```
/// use podar::config::UserSparsityConfig;
///
/// let config = UserSparsityConfig::total_sparsity(0.5).with_op_types(["Linear"]);
/// assert_eq!(config.total_sparsity, Some(0.5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSparsityConfig {
    /// Select ops of these types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_types: Option<Vec<String>>,

    /// Select ops with these exact names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_names: Option<Vec<String>>,

    /// Select ops whose names contain any of these substrings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_partial_names: Option<Vec<String>>,

    /// Alias of `sparsity_per_layer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparsity: Option<f64>,

    /// Same sparsity for every selected op, each op its own group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparsity_per_layer: Option<f64>,

    /// One sparsity for all selected ops together.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sparsity: Option<f64>,

    /// Remove the selected ops from all earlier entries.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude: bool,
}

impl UserSparsityConfig {
    /// Entry with a group-level target.
    pub fn total_sparsity(sparsity: f64) -> Self {
        Self {
            total_sparsity: Some(sparsity),
            ..Self::default()
        }
    }

    /// Entry with a per-layer target.
    pub fn per_layer(sparsity: f64) -> Self {
        Self {
            sparsity_per_layer: Some(sparsity),
            ..Self::default()
        }
    }

    /// Exclusion entry.
    pub fn exclude() -> Self {
        Self {
            exclude: true,
            ..Self::default()
        }
    }

    /// Select ops by type.
    pub fn with_op_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.op_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Select ops by exact name.
    pub fn with_op_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.op_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Select ops by name substring.
    pub fn with_op_partial_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.op_partial_names = Some(names.into_iter().map(Into::into).collect());
        self
    }
}
