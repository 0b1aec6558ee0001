//! Property-based tests for iterative pruning schedules.

use super::*;
use proptest::prelude::*;

fn schedules() -> Vec<Box<dyn CumulativeSchedule>> {
    vec![Box::new(Agp), Box::new(Linear), Box::new(LotteryTicket)]
}

proptest! {
    /// Every schedule is monotonic and ends exactly on the target.
    #[test]
    fn cumulative_monotonic_and_reaches_target(
        total in 1usize..50,
        target in 0.0f64..0.99,
    ) {
        for schedule in schedules() {
            let mut prev = 0.0;
            for i in schedule.first_iteration()..=total {
                let c = schedule.cumulative_target(i, total, target);
                prop_assert!(c >= prev - 1e-12, "{} not monotonic at {}", schedule.name(), i);
                prop_assert!((0.0..=target + 1e-12).contains(&c));
                prev = c;
            }
            prop_assert!((schedule.cumulative_target(total, total, target) - target).abs() < 1e-9);
        }
    }

    /// Requesting the incremental sparsity on top of the achieved sparsity
    /// lands on the cumulative target.
    #[test]
    fn incremental_recomposes(
        total in 1usize..30,
        target in 0.0f64..0.99,
        achieved_fraction in 0.0f64..1.0,
    ) {
        for schedule in schedules() {
            for i in schedule.first_iteration()..=total {
                let c = schedule.cumulative_target(i, total, target);
                let a = c * achieved_fraction;
                let s = incremental_sparsity(c, a).expect("in range");
                prop_assert!((0.0..=1.0).contains(&s));
                prop_assert!((1.0 - (1.0 - a) * (1.0 - s) - c).abs() < 1e-9);
            }
        }
    }
}
