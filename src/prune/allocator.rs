//! Per-op sparsity allocation under a group-level target.
//!
//! A group target is a weighted-average constraint: the fraction of pruned
//! elements over all ops of the group must equal `total_sparsity`. The
//! allocator projects a candidate per-op vector onto that constraint by
//! rescaling, and converts between sparsity relative to the remaining
//! (unmasked) weights and sparsity relative to the original weights.
//!
//! Candidate vectors are always sorted ascending and position `k` belongs to
//! the `k`-th smallest op of the group (see [`WeightSizeTable::ops_by_size`]).

use rand::Rng;

use crate::config::{default_max_attempts, ConfigList, SparsityConfig};
use crate::error::{PodarError, Result};
use crate::model::{MaskedRateTable, WeightSizeTable};

/// Converts group targets into feasible per-op sparsity vectors.
#[derive(Debug, Clone)]
pub struct SparsityAllocator {
    weights: WeightSizeTable,
    masked: MaskedRateTable,
    max_attempts: usize,
}

impl SparsityAllocator {
    /// Create an allocator over immutable weight-size and masked-rate tables.
    pub fn new(weights: WeightSizeTable, masked: MaskedRateTable) -> Self {
        Self {
            weights,
            masked,
            max_attempts: default_max_attempts(),
        }
    }

    /// Set the rejection-sampling retry cap.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Weight-size table.
    pub fn weights(&self) -> &WeightSizeTable {
        &self.weights
    }

    /// Masked-rate table.
    pub fn masked(&self) -> &MaskedRateTable {
        &self.masked
    }

    /// Scale a sorted candidate vector so the group hits `target_total`.
    ///
    /// `scale = target_total / (pruned / total)` with
    /// `pruned = Σ floor(size_i * fraction_i)`. Returns `None` when the
    /// candidate prunes no element at all.
    pub fn rescale(sorted_fractions: &[f64], target_total: f64, sorted_sizes: &[u64]) -> Option<Vec<f64>> {
        debug_assert_eq!(sorted_fractions.len(), sorted_sizes.len());

        let mut total = 0u64;
        let mut pruned = 0u64;
        for (&size, &fraction) in sorted_sizes.iter().zip(sorted_fractions) {
            total += size;
            pruned += (size as f64 * fraction).floor() as u64;
        }
        if pruned == 0 {
            return None;
        }

        let scale = target_total / (pruned as f64 / total as f64);
        Some(sorted_fractions.iter().map(|f| f * scale).collect())
    }

    /// Re-express group targets relative to the remaining unmasked weights.
    ///
    /// For a group with `P` already-pruned and `R` remaining elements the
    /// target becomes `max(0, target - P / (P + R))`. No-op when no op carries
    /// a prior mask.
    pub fn adjust_target_sparsity(&self, groups: &mut [SparsityConfig]) -> Result<()> {
        if self.masked.is_empty() {
            return Ok(());
        }
        for group in groups.iter_mut() {
            let mut remaining = 0u64;
            let mut pruned = 0u64;
            for name in &group.op_names {
                remaining += self.weights.require(name)?;
                pruned += self.masked.pruned(name).unwrap_or(0);
            }
            let denominator = (pruned + remaining) as f64;
            let already = if denominator > 0.0 {
                pruned as f64 / denominator
            } else {
                0.0
            };
            group.total_sparsity = (group.total_sparsity - already).max(0.0);
        }
        Ok(())
    }

    /// Absolute sparsity of an op given sparsity `relative` over its
    /// remaining weights and its prior masked fraction `masked_rate`.
    pub fn real_sparsity(relative: f64, masked_rate: f64) -> f64 {
        masked_rate + relative * (1.0 - masked_rate)
    }

    /// Rewrite single-op records so sparsity is relative to the original
    /// weight count.
    pub fn recover_real_sparsity(&self, config_list: &mut ConfigList) {
        for record in config_list.entries_mut() {
            debug_assert_eq!(record.op_names.len(), 1);
            let Some(name) = record.op_names.first() else {
                continue;
            };
            if let Some(rate) = self.masked.rate(name) {
                record.total_sparsity = Self::real_sparsity(record.total_sparsity, rate);
            }
        }
    }

    /// Group sizes ordered ascending.
    pub fn sorted_sizes(&self, group: &SparsityConfig) -> Result<Vec<u64>> {
        Ok(self
            .weights
            .ops_by_size(&group.op_names)?
            .into_iter()
            .map(|(_, size)| size)
            .collect())
    }

    /// Draw a sorted uniform vector and rescale it until it is feasible.
    ///
    /// A group with zero target yields an empty vector.
    pub fn sample_initial<R: Rng>(
        &self,
        group: &SparsityConfig,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        if group.total_sparsity == 0.0 {
            return Ok(Vec::new());
        }
        let sizes = self.sorted_sizes(group)?;
        self.rejection_sample(group.total_sparsity, &sizes, |rng| {
            let mut draw: Vec<f64> = (0..sizes.len()).map(|_| rng.random::<f64>()).collect();
            sort_ascending(&mut draw);
            draw
        }, rng)
    }

    /// Perturb a current feasible vector by uniform offsets in
    /// `[-magnitude, magnitude]`, clip at zero and rescale until feasible.
    pub fn perturb<R: Rng>(
        &self,
        group: &SparsityConfig,
        current: &[f64],
        magnitude: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        if current.is_empty() {
            return Ok(Vec::new());
        }
        let sizes = self.sorted_sizes(group)?;
        self.rejection_sample(group.total_sparsity, &sizes, |rng| {
            let mut draw: Vec<f64> = current
                .iter()
                .map(|s| {
                    let offset = if magnitude > 0.0 {
                        rng.random_range(-magnitude..magnitude)
                    } else {
                        0.0
                    };
                    (s + offset).max(0.0)
                })
                .collect();
            sort_ascending(&mut draw);
            draw
        }, rng)
    }

    fn rejection_sample<R, F>(&self, target: f64, sizes: &[u64], mut draw: F, rng: &mut R) -> Result<Vec<f64>>
    where
        R: Rng,
        F: FnMut(&mut R) -> Vec<f64>,
    {
        for _ in 0..self.max_attempts {
            let candidate = draw(rng);
            if let Some(scaled) = Self::rescale(&candidate, target, sizes) {
                if is_feasible(&scaled) {
                    return Ok(scaled);
                }
            }
        }
        Err(PodarError::RescaleDiverged {
            target,
            attempts: self.max_attempts,
        })
    }

    /// Map a sorted vector back to single-op records, smallest op first.
    pub fn to_config_list(&self, group: &SparsityConfig, sparsity: &[f64]) -> Result<Vec<SparsityConfig>> {
        let ops = self.weights.ops_by_size(&group.op_names)?;
        debug_assert!(sparsity.is_empty() || sparsity.len() == ops.len());
        Ok(ops
            .into_iter()
            .zip(sparsity)
            .map(|((name, _), &s)| SparsityConfig::single(name, s))
            .collect())
    }

    /// Expand a group target uniformly to single-op records.
    ///
    /// Every op gets the same sparsity, which satisfies the weighted-average
    /// constraint exactly.
    pub fn expand_uniform(&self, group: &SparsityConfig, sparsity: f64) -> Result<Vec<SparsityConfig>> {
        Ok(self
            .weights
            .ops_by_size(&group.op_names)?
            .into_iter()
            .map(|(name, _)| SparsityConfig::single(name, sparsity))
            .collect())
    }
}

fn sort_ascending(values: &mut [f64]) {
    values.sort_by(f64::total_cmp);
}

fn is_feasible(sorted: &[f64]) -> bool {
    match (sorted.first(), sorted.last()) {
        (Some(&first), Some(&last)) => first >= 0.0 && last < 1.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MaskedRate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sizes() -> WeightSizeTable {
        WeightSizeTable::from_pairs([("conv1", 150u64), ("fc1", 48000), ("fc2", 10080), ("fc3", 840)])
    }

    fn group(target: f64) -> SparsityConfig {
        SparsityConfig::new(["conv1", "fc1", "fc2", "fc3"], target)
    }

    fn pruned_fraction(sparsity: &[f64], sorted_sizes: &[u64]) -> f64 {
        let total: u64 = sorted_sizes.iter().sum();
        let pruned: f64 = sorted_sizes
            .iter()
            .zip(sparsity)
            .map(|(&n, &s)| n as f64 * s)
            .sum();
        pruned / total as f64
    }

    #[test]
    fn test_rescale_hits_target() {
        let sizes = [100u64, 200, 400];
        let scaled = SparsityAllocator::rescale(&[0.1, 0.2, 0.3], 0.25, &sizes).expect("feasible");
        // 10 + 40 + 120 = 170 of 700 pruned before scaling.
        let scale = 0.25 / (170.0 / 700.0);
        assert!((scaled[2] - 0.3 * scale).abs() < 1e-12);
        assert!((pruned_fraction(&scaled, &sizes) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_rescale_uses_floor_of_pruned_elements() {
        // floor(10 * 0.15) = 1 pruned of 10.
        let scaled = SparsityAllocator::rescale(&[0.15], 0.5, &[10]).expect("feasible");
        assert!((scaled[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_rescale_zero_pruned_is_infeasible() {
        assert!(SparsityAllocator::rescale(&[0.001, 0.002], 0.5, &[10, 20]).is_none());
        assert!(SparsityAllocator::rescale(&[0.0, 0.0], 0.5, &[10, 20]).is_none());
    }

    #[test]
    fn test_adjust_target_without_masks_is_noop() {
        let allocator = SparsityAllocator::new(sizes(), MaskedRateTable::default());
        let mut groups = vec![group(0.6)];
        allocator.adjust_target_sparsity(&mut groups).expect("adjust");
        assert_eq!(groups[0].total_sparsity, 0.6);
    }

    #[test]
    fn test_adjust_target_subtracts_masked_fraction() {
        // fc: 1000 original, 200 already pruned, 800 remaining.
        let weights = WeightSizeTable::from_pairs([("fc", 800u64), ("proj", 1000)]);
        let mut masked = MaskedRateTable::default();
        masked.insert("fc", MaskedRate { rate: 0.2, pruned: 200 });
        let allocator = SparsityAllocator::new(weights, masked);

        let mut groups = vec![SparsityConfig::new(["fc", "proj"], 0.5), SparsityConfig::new(["fc"], 0.1)];
        allocator.adjust_target_sparsity(&mut groups).expect("adjust");
        // 200 / (200 + 1800) = 0.1
        assert!((groups[0].total_sparsity - 0.4).abs() < 1e-12);
        // 0.1 - 0.2 clamps to zero.
        assert_eq!(groups[1].total_sparsity, 0.0);
    }

    #[test]
    fn test_recover_real_sparsity_inverts_relative_conversion() {
        let masked_rate = 0.3;
        let absolute = 0.65;
        let relative = (absolute - masked_rate) / (1.0 - masked_rate);
        let recovered = SparsityAllocator::real_sparsity(relative, masked_rate);
        assert!((recovered - absolute).abs() < 1e-12);
    }

    #[test]
    fn test_recover_real_sparsity_on_config_list() {
        let mut masked = MaskedRateTable::default();
        masked.insert("fc1", MaskedRate { rate: 0.5, pruned: 24000 });
        let allocator = SparsityAllocator::new(sizes(), masked);
        let mut list: ConfigList = vec![SparsityConfig::single("fc1", 0.5), SparsityConfig::single("fc2", 0.5)]
            .into_iter()
            .collect();
        allocator.recover_real_sparsity(&mut list);
        assert_eq!(list.sparsity_of("fc1"), Some(0.75));
        assert_eq!(list.sparsity_of("fc2"), Some(0.5));
    }

    #[test]
    fn test_sample_initial_is_feasible_and_sorted() {
        let allocator = SparsityAllocator::new(sizes(), MaskedRateTable::default());
        let mut rng = StdRng::seed_from_u64(42);
        let g = group(0.5);
        let sparsity = allocator.sample_initial(&g, &mut rng).expect("sample");
        let sorted_sizes = allocator.sorted_sizes(&g).expect("sizes");

        assert_eq!(sparsity.len(), 4);
        assert!(sparsity.windows(2).all(|w| w[0] <= w[1]));
        assert!(sparsity[0] >= 0.0 && sparsity[3] < 1.0);
        // floor() in the scale makes the realised fraction slightly above target.
        let achieved = pruned_fraction(&sparsity, &sorted_sizes);
        assert!((achieved - 0.5).abs() < 1e-2, "achieved {achieved}");
    }

    #[test]
    fn test_sample_initial_zero_target_is_empty() {
        let allocator = SparsityAllocator::new(sizes(), MaskedRateTable::default());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(allocator.sample_initial(&group(0.0), &mut rng).expect("sample").is_empty());
    }

    #[test]
    fn test_sample_initial_gives_up_after_cap() {
        // floor(1 * u) is 0 for every draw, so no candidate is feasible.
        let weights = WeightSizeTable::from_pairs([("tiny", 1u64)]);
        let allocator = SparsityAllocator::new(weights, MaskedRateTable::default()).with_max_attempts(5);
        let mut rng = StdRng::seed_from_u64(3);
        let err = allocator
            .sample_initial(&SparsityConfig::new(["tiny"], 0.5), &mut rng)
            .unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(matches!(err, PodarError::RescaleDiverged { attempts: 5, .. }));
    }

    #[test]
    fn test_perturb_keeps_constraint() {
        let allocator = SparsityAllocator::new(sizes(), MaskedRateTable::default());
        let mut rng = StdRng::seed_from_u64(9);
        let g = group(0.4);
        let current = allocator.sample_initial(&g, &mut rng).expect("sample");
        let next = allocator.perturb(&g, &current, 0.2, &mut rng).expect("perturb");
        assert_eq!(next.len(), current.len());
        assert!(next.windows(2).all(|w| w[0] <= w[1]));
        assert!(next[0] >= 0.0 && next[next.len() - 1] < 1.0);
    }

    #[test]
    fn test_to_config_list_maps_by_ascending_size() {
        let allocator = SparsityAllocator::new(sizes(), MaskedRateTable::default());
        let records = allocator
            .to_config_list(&group(0.5), &[0.1, 0.2, 0.3, 0.4])
            .expect("records");
        let names: Vec<&str> = records.iter().map(|r| r.op_names[0].as_str()).collect();
        assert_eq!(names, vec!["conv1", "fc3", "fc2", "fc1"]);
        assert_eq!(records[3].total_sparsity, 0.4);
    }

    #[test]
    fn test_expand_uniform() {
        let allocator = SparsityAllocator::new(sizes(), MaskedRateTable::default());
        let records = allocator.expand_uniform(&group(0.5), 0.3).expect("records");
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.total_sparsity == 0.3 && r.op_names.len() == 1));
    }
}
