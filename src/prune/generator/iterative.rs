//! Schedule-driven iterative generator shared by AGP, Linear and
//! LotteryTicket.

use tracing::info;

use super::state::GeneratorCore;
use super::TaskGenerator;
use crate::config::ConfigList;
use crate::error::{PodarError, Result};
use crate::model::weight_element_counts;
use crate::prune::allocator::SparsityAllocator;
use crate::prune::schedule::{incremental_sparsity, Agp, CumulativeSchedule, Linear, LotteryTicket};
use crate::prune::task::{Task, TaskResult};

/// Iteration counters of a schedule-driven run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationState {
    pub current_iteration: usize,
    pub total_iteration: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Done,
}

/// Emits one task per iteration until `total_iteration` is passed.
///
/// Each task asks for the incremental sparsity that brings the compact model
/// from its achieved sparsity to the schedule's cumulative target, and
/// builds on the previous task's compact model and masks.
#[derive(Debug)]
pub struct IterativeTaskGenerator<S: CumulativeSchedule> {
    core: GeneratorCore,
    schedule: S,
    allocator: SparsityAllocator,
    state: IterationState,
    phase: Phase,
}

/// AGP generator.
pub type AgpTaskGenerator = IterativeTaskGenerator<Agp>;
/// Linear generator.
pub type LinearTaskGenerator = IterativeTaskGenerator<Linear>;
/// Lottery-ticket generator.
pub type LotteryTicketTaskGenerator = IterativeTaskGenerator<LotteryTicket>;

impl<S: CumulativeSchedule> IterativeTaskGenerator<S> {
    pub fn new(schedule: S, total_iteration: usize, core: GeneratorCore) -> Result<Self> {
        if total_iteration == 0 {
            return Err(PodarError::config("total_iteration", "must be at least 1"));
        }
        let (weights, masked) =
            weight_element_counts(core.origin_model(), core.target(), core.origin_masks())?;
        let state = IterationState {
            current_iteration: schedule.first_iteration(),
            total_iteration,
        };
        Ok(Self {
            core,
            schedule,
            allocator: SparsityAllocator::new(weights, masked),
            state,
            phase: Phase::Running,
        })
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    pub fn schedule(&self) -> &S {
        &self.schedule
    }

    fn next_config_list(&self, compact2origin: &[f64]) -> Result<ConfigList> {
        let IterationState {
            current_iteration,
            total_iteration,
        } = self.state;
        let mut config_list = ConfigList::new();
        for (group, &achieved) in self.core.target().iter().zip(compact2origin) {
            let cumulative = self.schedule.cumulative_target(
                current_iteration,
                total_iteration,
                group.total_sparsity,
            );
            let incremental = incremental_sparsity(cumulative, achieved)?;
            tracing::debug!(
                iteration = current_iteration,
                cumulative,
                achieved,
                incremental,
                "group target"
            );
            config_list.extend(self.allocator.expand_uniform(group, incremental)?);
        }
        Ok(config_list)
    }
}

impl<S: CumulativeSchedule + 'static> TaskGenerator for IterativeTaskGenerator<S> {
    fn name(&self) -> &'static str {
        self.schedule.name()
    }

    fn core(&self) -> &GeneratorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GeneratorCore {
        &mut self.core
    }

    fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    fn generate_tasks(&mut self, result: &TaskResult) -> Result<Vec<Task>> {
        let (snapshot, report) = self.core.observe(result)?;

        if self.state.current_iteration > self.state.total_iteration {
            if self.phase == Phase::Running {
                info!(
                    strategy = self.schedule.name(),
                    total_iteration = self.state.total_iteration,
                    "iteration limit reached"
                );
            }
            self.phase = Phase::Done;
            return Ok(Vec::new());
        }

        let compact2origin: Vec<f64> = report.compact2origin.iter().map(|g| g.total_sparsity).collect();
        let config_list = self.next_config_list(&compact2origin)?;
        let task = self.core.emit(&snapshot, &config_list)?;
        self.state.current_iteration += 1;
        Ok(vec![task])
    }
}
