//! Weight masks produced by an external pruner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::layout::{load_document, ModelLayout};
use crate::error::Result;

/// Keep-mask for one weight tensor.
///
/// Stored as the element count plus sorted, disjoint, half-open ranges of
/// pruned elements, so an identity mask serializes as `{"numel": n}`
/// whatever the tensor size. A plain keep-vector (`true` = kept) is also
/// accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LayerMaskRepr", into = "RangeMask")]
pub struct LayerMask {
    numel: usize,
    pruned_ranges: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeMask {
    numel: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pruned_ranges: Vec<(usize, usize)>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LayerMaskRepr {
    Ranges(RangeMask),
    Keep(Vec<bool>),
}

impl From<LayerMask> for RangeMask {
    fn from(mask: LayerMask) -> Self {
        Self {
            numel: mask.numel,
            pruned_ranges: mask.pruned_ranges,
        }
    }
}

impl TryFrom<LayerMaskRepr> for LayerMask {
    type Error = String;

    fn try_from(repr: LayerMaskRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            LayerMaskRepr::Keep(keep) => Ok(Self::from_keep(keep)),
            LayerMaskRepr::Ranges(RangeMask { numel, pruned_ranges }) => {
                if let Some(&(start, end)) = pruned_ranges.iter().find(|&&(start, end)| start > end || end > numel) {
                    return Err(format!("pruned range [{start}, {end}) outside mask of {numel} elements"));
                }
                Ok(Self::from_ranges(numel, pruned_ranges))
            }
        }
    }
}

impl LayerMask {
    /// Mask keeping every element.
    pub fn dense(numel: usize) -> Self {
        Self {
            numel,
            pruned_ranges: Vec::new(),
        }
    }

    /// Mask from an explicit keep-vector.
    pub fn from_keep(keep: Vec<bool>) -> Self {
        let mut pruned_ranges = Vec::new();
        let mut start = None;
        for (i, &kept) in keep.iter().enumerate() {
            match (kept, start) {
                (false, None) => start = Some(i),
                (true, Some(s)) => {
                    pruned_ranges.push((s, i));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            pruned_ranges.push((s, keep.len()));
        }
        Self {
            numel: keep.len(),
            pruned_ranges,
        }
    }

    /// Mask from pruned ranges; ranges are clipped to `numel`, sorted and
    /// merged.
    pub fn from_ranges(numel: usize, ranges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut ranges: Vec<(usize, usize)> = ranges
            .into_iter()
            .map(|(start, end)| (start.min(numel), end.min(numel)))
            .filter(|(start, end)| start < end)
            .collect();
        ranges.sort_unstable();

        let mut pruned_ranges: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match pruned_ranges.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => pruned_ranges.push((start, end)),
            }
        }
        Self { numel, pruned_ranges }
    }

    /// Mask of `numel` elements whose first `pruned` entries are zeroed.
    pub fn with_pruned(numel: usize, pruned: usize) -> Self {
        Self::from_ranges(numel, [(0, pruned)])
    }

    /// Number of elements covered by the mask.
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Number of kept (non-zero) elements.
    pub fn kept(&self) -> usize {
        self.numel - self.pruned()
    }

    /// Number of pruned elements.
    pub fn pruned(&self) -> usize {
        self.pruned_ranges.iter().map(|(start, end)| end - start).sum()
    }

    /// Half-open ranges of pruned elements, ascending.
    pub fn pruned_ranges(&self) -> &[(usize, usize)] {
        &self.pruned_ranges
    }

    /// Whether element `index` is kept.
    pub fn is_kept(&self, index: usize) -> bool {
        index < self.numel && !self.pruned_ranges.iter().any(|&(start, end)| (start..end).contains(&index))
    }

    /// Fraction of elements already pruned.
    pub fn masked_rate(&self) -> f64 {
        if self.numel == 0 {
            return 0.0;
        }
        self.pruned() as f64 / self.numel as f64
    }
}

/// Masks keyed by op name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskSet {
    masks: BTreeMap<String, LayerMask>,
}

impl MaskSet {
    /// Create an empty mask set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity masks (all weights kept) for every op of a layout.
    pub fn identity(layout: &ModelLayout) -> Self {
        let masks = layout
            .ops()
            .iter()
            .map(|op| (op.name.clone(), LayerMask::dense(op.numel as usize)))
            .collect();
        Self { masks }
    }

    /// Load masks from a JSON or YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_document(path.as_ref())
    }

    /// Insert or replace the mask of an op.
    pub fn insert(&mut self, name: impl Into<String>, mask: LayerMask) {
        self.masks.insert(name.into(), mask);
    }

    /// Builder-style insert.
    pub fn with_mask(mut self, name: impl Into<String>, mask: LayerMask) -> Self {
        self.insert(name, mask);
        self
    }

    /// Mask of an op, if any.
    pub fn get(&self, name: &str) -> Option<&LayerMask> {
        self.masks.get(name)
    }

    /// Check if no masks are present.
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Number of masked ops.
    pub fn len(&self) -> usize {
        self.masks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_mask_counts() {
        let mask = LayerMask::from_keep(vec![true, false, true, false]);
        assert_eq!(mask.numel(), 4);
        assert_eq!(mask.kept(), 2);
        assert!((mask.masked_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_layer_mask_with_pruned_saturates() {
        let mask = LayerMask::with_pruned(10, 25);
        assert_eq!(mask.kept(), 0);
        assert!((mask.masked_rate() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mask_rate_is_zero() {
        assert_eq!(LayerMask::from_keep(Vec::new()).masked_rate(), 0.0);
    }

    #[test]
    fn test_identity_masks_keep_everything() {
        let layout = ModelLayout::default().with_op("a", "Linear", 8).with_op("b", "Linear", 4);
        let masks = MaskSet::identity(&layout);
        assert_eq!(masks.len(), 2);
        assert_eq!(masks.get("a").map(LayerMask::kept), Some(8));
        assert_eq!(masks.get("b").map(LayerMask::masked_rate), Some(0.0));
    }

    #[test]
    fn test_mask_set_serializes_as_map() {
        let masks = MaskSet::new().with_mask("fc", LayerMask::from_keep(vec![true, false]));
        let json = serde_json::to_string(&masks).expect("serialization should succeed");
        assert_eq!(json, r#"{"fc":{"numel":2,"pruned_ranges":[[1,2]]}}"#);
    }

    #[test]
    fn test_from_keep_collapses_runs() {
        let mask = LayerMask::from_keep(vec![false, false, true, true, false, true, false]);
        assert_eq!(mask.pruned_ranges(), &[(0, 2), (4, 5), (6, 7)]);
        assert_eq!(mask.kept(), 3);
        assert!(mask.is_kept(2));
        assert!(!mask.is_kept(6));
        assert!(!mask.is_kept(7));
    }

    #[test]
    fn test_from_ranges_merges_and_clips() {
        let mask = LayerMask::from_ranges(10, [(6, 12), (0, 2), (1, 4), (5, 5)]);
        assert_eq!(mask.pruned_ranges(), &[(0, 4), (6, 10)]);
        assert_eq!(mask.pruned(), 8);
    }

    // Snapshot size must not grow with the weight count.
    #[test]
    fn test_identity_masks_serialize_without_per_weight_entries() {
        let layout = ModelLayout::default()
            .with_op("fc1", "Linear", 1_000_000)
            .with_op("fc2", "Linear", 1_000_000);
        let masks = MaskSet::identity(&layout);
        let json = serde_json::to_vec_pretty(&masks).expect("serialization should succeed");
        assert!(json.len() < 128, "identity masks take {} bytes", json.len());

        let restored: MaskSet = serde_json::from_slice(&json).expect("deserialization should succeed");
        assert_eq!(restored, masks);
        assert_eq!(restored.get("fc1").map(LayerMask::kept), Some(1_000_000));
    }

    #[test]
    fn test_keep_vector_still_loads() {
        let masks: MaskSet = serde_json::from_str(r#"{"fc":[false,false,true]}"#).expect("keep vector should load");
        assert_eq!(masks.get("fc"), Some(&LayerMask::with_pruned(3, 2)));
    }

    #[test]
    fn test_out_of_bounds_range_rejected() {
        let result = serde_json::from_str::<MaskSet>(r#"{"fc":{"numel":4,"pruned_ranges":[[2,9]]}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_mask_set_from_yaml_file() {
        let dir = tempfile::TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("masks.yaml");
        std::fs::write(&path, "fc1:\n  numel: 6\n  pruned_ranges: [[0, 3]]\nfc2: [true, false]\n")
            .expect("write should succeed");

        let masks = MaskSet::from_file(&path).expect("load should succeed");
        assert_eq!(masks.get("fc1").map(LayerMask::kept), Some(3));
        assert_eq!(masks.get("fc2"), Some(&LayerMask::from_ranges(2, [(1, 2)])));
    }
}
