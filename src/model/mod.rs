//! Model inspection collaborator
//!
//! The task generators never touch tensors. They see a model as an ordered
//! weight layout plus optional keep-masks, and derive from it:
//!
//! - **Weight sizes**: element counts per op, after pre-existing masks
//! - **Masked rates**: fraction of each op already pruned
//! - **Sparsity reports**: compact-vs-original telemetry per config group

mod inspect;
mod layout;
mod mask;

pub use inspect::{
    compare_sparsity, masked_rate, weight_element_counts, MaskedRate, MaskedRateTable,
    SparsityReport, WeightSizeTable,
};
pub use layout::{ModelLayout, OpLayout};
pub use mask::{LayerMask, MaskSet};
