//! Model inspection: weight sizes, mask rates and sparsity comparison.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::layout::ModelLayout;
use super::mask::MaskSet;
use crate::config::SparsityConfig;
use crate::error::{PodarError, Result};

/// Immutable `op_name -> weight element count` table.
///
/// For ops carrying a pre-existing mask the count is the number of weights
/// the mask keeps, i.e. the budget left for further pruning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightSizeTable {
    sizes: BTreeMap<String, u64>,
}

impl WeightSizeTable {
    /// Build a table from `(name, count)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            sizes: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Element count of an op.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.sizes.get(name).copied()
    }

    /// Element count of an op, or a configuration error naming it.
    pub fn require(&self, name: &str) -> Result<u64> {
        self.get(name)
            .ok_or_else(|| PodarError::config("op_names", format!("unknown op '{name}'")))
    }

    /// Group members ordered by ascending element count.
    ///
    /// Ties keep the group's own op order. Sampled sparsity vectors are
    /// indexed by this order, so it must never change between calls.
    pub fn ops_by_size<'a>(&self, op_names: &'a [String]) -> Result<Vec<(&'a str, u64)>> {
        let mut ops = op_names
            .iter()
            .map(|name| Ok((name.as_str(), self.require(name)?)))
            .collect::<Result<Vec<_>>>()?;
        ops.sort_by_key(|&(_, size)| size);
        Ok(ops)
    }

    /// Number of ops.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

/// Already-pruned state of one op from a pre-existing mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskedRate {
    /// Fraction of the original weights already pruned.
    pub rate: f64,
    /// Number of original weights already pruned.
    pub pruned: u64,
}

/// Immutable `op_name -> already-pruned fraction` table. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskedRateTable {
    rates: BTreeMap<String, MaskedRate>,
}

impl MaskedRateTable {
    /// Insert an entry.
    pub fn insert(&mut self, name: impl Into<String>, rate: MaskedRate) {
        self.rates.insert(name.into(), rate);
    }

    /// Already-pruned fraction of an op, if it was masked.
    pub fn rate(&self, name: &str) -> Option<f64> {
        self.rates.get(name).map(|r| r.rate)
    }

    /// Already-pruned element count of an op, if it was masked.
    pub fn pruned(&self, name: &str) -> Option<u64> {
        self.rates.get(name).map(|r| r.pruned)
    }

    /// Number of masked ops.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if no op was masked.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Build the weight-size and masked-rate tables for every op in `groups`.
pub fn weight_element_counts(
    model: &ModelLayout,
    groups: &[SparsityConfig],
    masks: &MaskSet,
) -> Result<(WeightSizeTable, MaskedRateTable)> {
    let mut sizes = BTreeMap::new();
    let mut rates = MaskedRateTable::default();

    for name in groups.iter().flat_map(|g| g.op_names.iter()) {
        let op = model
            .get(name)
            .ok_or_else(|| PodarError::config("op_names", format!("unknown op '{name}'")))?;
        match masks.get(name) {
            Some(mask) => {
                let kept = mask.kept() as u64;
                rates.insert(
                    name.clone(),
                    MaskedRate {
                        rate: mask.masked_rate(),
                        pruned: (mask.numel() as u64).saturating_sub(kept),
                    },
                );
                sizes.insert(name.clone(), kept);
            }
            None => {
                sizes.insert(name.clone(), op.numel);
            }
        }
    }

    Ok((WeightSizeTable { sizes }, rates))
}

/// Already-pruned fraction of every masked op.
pub fn masked_rate(model: &ModelLayout, masks: &MaskSet) -> MaskedRateTable {
    let mut rates = MaskedRateTable::default();
    for op in model.ops() {
        if let Some(mask) = masks.get(&op.name) {
            let kept = mask.kept() as u64;
            rates.insert(
                op.name.clone(),
                MaskedRate {
                    rate: mask.masked_rate(),
                    pruned: (mask.numel() as u64).saturating_sub(kept),
                },
            );
        }
    }
    rates
}

/// Per-group sparsity of a compact model relative to the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparsityReport {
    /// Structure plus masks, relative to the original model.
    pub current2origin: Vec<SparsityConfig>,
    /// Structural shrinkage only, relative to the original model.
    pub compact2origin: Vec<SparsityConfig>,
    /// Mask zeros relative to the compact model.
    pub mask2compact: Vec<SparsityConfig>,
}

/// Compare a compact model (and its masks) with the original, per group.
pub fn compare_sparsity(
    origin: &ModelLayout,
    compact: &ModelLayout,
    masks: &MaskSet,
    groups: &[SparsityConfig],
) -> SparsityReport {
    let mut report = SparsityReport::default();

    for group in groups {
        let mut origin_total = 0u64;
        let mut compact_total = 0u64;
        let mut kept_total = 0u64;
        for name in &group.op_names {
            origin_total += origin.numel(name).unwrap_or(0);
            let compact_numel = compact.numel(name).unwrap_or(0);
            compact_total += compact_numel;
            kept_total += masks
                .get(name)
                .map_or(compact_numel, |mask| mask.kept() as u64);
        }

        let c2o = ratio_pruned(compact_total, origin_total);
        let m2c = ratio_pruned(kept_total, compact_total);
        let c2cur = 1.0 - (1.0 - c2o) * (1.0 - m2c);

        report
            .compact2origin
            .push(SparsityConfig::new(group.op_names.clone(), c2o));
        report
            .mask2compact
            .push(SparsityConfig::new(group.op_names.clone(), m2c));
        report
            .current2origin
            .push(SparsityConfig::new(group.op_names.clone(), c2cur));
    }

    report
}

fn ratio_pruned(left: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        1.0 - left as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LayerMask;

    fn origin() -> ModelLayout {
        ModelLayout::default()
            .with_op("fc1", "Linear", 100)
            .with_op("fc2", "Linear", 300)
            .with_op("head", "Linear", 50)
    }

    fn groups() -> Vec<SparsityConfig> {
        vec![SparsityConfig::new(["fc1", "fc2"], 0.5)]
    }

    #[test]
    fn test_weight_counts_without_masks() {
        let (sizes, rates) =
            weight_element_counts(&origin(), &groups(), &MaskSet::new()).expect("counts");
        assert_eq!(sizes.get("fc1"), Some(100));
        assert_eq!(sizes.get("fc2"), Some(300));
        assert_eq!(sizes.get("head"), None, "ops outside groups are not counted");
        assert!(rates.is_empty());
    }

    #[test]
    fn test_weight_counts_with_masks_use_remaining() {
        let masks = MaskSet::new().with_mask("fc2", LayerMask::with_pruned(300, 60));
        let (sizes, rates) = weight_element_counts(&origin(), &groups(), &masks).expect("counts");
        assert_eq!(sizes.get("fc2"), Some(240));
        assert_eq!(rates.pruned("fc2"), Some(60));
        assert!((rates.rate("fc2").unwrap_or_default() - 0.2).abs() < 1e-12);
        assert_eq!(rates.rate("fc1"), None);
    }

    #[test]
    fn test_weight_counts_unknown_op() {
        let groups = vec![SparsityConfig::new(["nope"], 0.5)];
        let err = weight_element_counts(&origin(), &groups, &MaskSet::new()).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_ops_by_size_ascending_stable() {
        let table = WeightSizeTable::from_pairs([("a", 30u64), ("b", 10), ("c", 30), ("d", 20)]);
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let ordered = table.ops_by_size(&names).expect("all ops known");
        assert_eq!(ordered, vec![("b", 10), ("d", 20), ("a", 30), ("c", 30)]);
    }

    #[test]
    fn test_masked_rate_table() {
        let masks = MaskSet::new().with_mask("fc1", LayerMask::with_pruned(100, 25));
        let rates = masked_rate(&origin(), &masks);
        assert_eq!(rates.len(), 1);
        assert!((rates.rate("fc1").unwrap_or_default() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_compare_sparsity_structure_and_masks() {
        // fc2 shrunk to 200 elements; half of fc1 masked.
        let compact = ModelLayout::default()
            .with_op("fc1", "Linear", 100)
            .with_op("fc2", "Linear", 200)
            .with_op("head", "Linear", 50);
        let masks = MaskSet::new().with_mask("fc1", LayerMask::with_pruned(100, 50));
        let report = compare_sparsity(&origin(), &compact, &masks, &groups());

        let c2o = report.compact2origin[0].total_sparsity;
        let m2c = report.mask2compact[0].total_sparsity;
        let cur = report.current2origin[0].total_sparsity;
        assert!((c2o - 0.25).abs() < 1e-12, "300/400 left");
        assert!((m2c - 50.0 / 300.0).abs() < 1e-12);
        assert!((cur - (1.0 - 0.75 * (250.0 / 300.0))).abs() < 1e-12);
        assert_eq!(report.current2origin[0].op_names, vec!["fc1", "fc2"]);
    }

    #[test]
    fn test_compare_sparsity_identity() {
        let report = compare_sparsity(&origin(), &origin(), &MaskSet::identity(&origin()), &groups());
        assert_eq!(report.current2origin[0].total_sparsity, 0.0);
        assert_eq!(report.compact2origin[0].total_sparsity, 0.0);
    }
}
