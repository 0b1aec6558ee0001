//! Cumulative-target functions.

use super::CumulativeSchedule;

/// Automated gradual pruning: `C(i) = T * (1 - (1 - i/N)^3)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Agp;

impl CumulativeSchedule for Agp {
    fn name(&self) -> &'static str {
        "agp"
    }

    fn cumulative_target(&self, iteration: usize, total: usize, target: f64) -> f64 {
        let ratio = 1.0 - iteration as f64 / total as f64;
        (1.0 - ratio.powi(3)) * target
    }
}

/// Linear schedule: `C(i) = T * i/N`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Linear;

impl CumulativeSchedule for Linear {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn cumulative_target(&self, iteration: usize, total: usize, target: f64) -> f64 {
        iteration as f64 / total as f64 * target
    }
}

/// Lottery-ticket schedule: `C(i) = 1 - (1 - T)^(i/N)`.
///
/// Counting starts at 1; iteration 0 is the unpruned origin task.
// The paper's `(100T)^(i/N) / 100` form is numerically unstable and is not used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LotteryTicket;

impl CumulativeSchedule for LotteryTicket {
    fn name(&self) -> &'static str {
        "lottery_ticket"
    }

    fn cumulative_target(&self, iteration: usize, total: usize, target: f64) -> f64 {
        1.0 - (1.0 - target).powf(iteration as f64 / total as f64)
    }

    fn first_iteration(&self) -> usize {
        1
    }
}
