//! Iterative pruning schedules
//!
//! A schedule maps an iteration index to the cumulative sparsity the model
//! should reach by that iteration, measured against the original weight
//! count:
//! - AGP: cubic decay, fast pruning early (Zhu & Gupta, 2017)
//! - Linear: equal steps
//! - LotteryTicket: geometric steps (Frankle & Carbin, 2018)
//!
//! The driver then asks for the *incremental* sparsity to apply to the
//! already-compacted weights, see [`incremental_sparsity`].
//!
//! # References
//! - Zhu, M., & Gupta, S. (2017). To prune, or not to prune. arXiv:1710.01878.
//! - Frankle, J., & Carbin, M. (2018). The Lottery Ticket Hypothesis. arXiv:1803.03635.

mod functions;

#[cfg(test)]
mod proptests;

pub use functions::{Agp, Linear, LotteryTicket};

use crate::error::{PodarError, Result};

/// Cumulative-target function shared by all iterative strategies.
pub trait CumulativeSchedule: std::fmt::Debug + Send {
    /// Strategy name used in logs.
    fn name(&self) -> &'static str;

    /// Cumulative sparsity `C(i)` for iteration `iteration` of `total`
    /// towards `target`.
    fn cumulative_target(&self, iteration: usize, total: usize, target: f64) -> f64;

    /// Index of the first iteration this strategy schedules.
    fn first_iteration(&self) -> usize {
        0
    }
}

/// Incremental sparsity to apply on the currently-compact weights.
///
/// Sequential masks compose as `(1 - A)(1 - S)` remaining density, so
/// reaching `cumulative` from `achieved` needs
/// `S = max(0, (cumulative - achieved) / (1 - achieved))`. A result outside
/// `[0, 1]` is an invariant violation carrying all three values.
pub fn incremental_sparsity(cumulative: f64, achieved: f64) -> Result<f64> {
    let incremental = ((cumulative - achieved) / (1.0 - achieved)).max(0.0);
    if !(0.0..=1.0).contains(&incremental) {
        return Err(PodarError::SparsityOutOfRange {
            cumulative,
            achieved,
            incremental,
        });
    }
    Ok(incremental)
}
