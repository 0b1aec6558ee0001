//! Iterative pruning task generation
//!
//! This module decides what sparsity to request from an external pruning
//! executor, one round at a time:
//!
//! - **Sparsity Allocation**: per-op sparsity under a group-level target
//! - **Schedules**: AGP, Linear and LotteryTicket cumulative targets
//! - **Task Generators**: schedule-driven and simulated-annealing drivers
//!
//! # Example
//!
//! ```
//! use podar::config::UserSparsityConfig;
//! use podar::model::{MaskSet, ModelLayout};
//! use podar::prune::{AgpTaskGenerator, Agp, GeneratorCore, TaskGenerator, TaskResult};
//! use podar::storage::{InMemoryStore, RunStore};
//!
//! let model = ModelLayout::default()
//!     .with_op("fc1", "Linear", 4096)
//!     .with_op("fc2", "Linear", 1024);
//! let config = [UserSparsityConfig::total_sparsity(0.5).with_op_types(["Linear"])];
//! let core = GeneratorCore::new(model.clone(), MaskSet::new(), &config, RunStore::new(InMemoryStore::new()))?;
//! let mut generator = AgpTaskGenerator::new(Agp, 4, core)?;
//!
//! generator.init_pending_tasks()?;
//! while let Some(task) = generator.next() {
//!     // Run the executor on `task` here.
//!     generator.receive_task_result(TaskResult::new(task.task_id, model.clone(), MaskSet::new()))?;
//! }
//! assert!(generator.is_done());
//! # Ok::<(), podar::PodarError>(())
//! ```
//!
//! # References
//!
//! - Zhu, M., & Gupta, S. (2017). To prune, or not to prune. arXiv:1710.01878.
//! - Frankle, J., & Carbin, M. (2018). The Lottery Ticket Hypothesis. arXiv:1803.03635.
//! - Kirkpatrick, S., et al. (1983). Optimization by Simulated Annealing. Science.

mod allocator;
mod generator;
mod schedule;
mod task;

pub use allocator::SparsityAllocator;
pub use generator::{
    build_generator, build_generator_from_parts, start_run, AgpTaskGenerator, AnnealState,
    AnnealingTaskGenerator, BestResult, Decision, GeneratorCore, IterationState,
    IterativeTaskGenerator, LinearTaskGenerator, LotteryTicketTaskGenerator, TaskGenerator,
};
pub use schedule::{incremental_sparsity, Agp, CumulativeSchedule, Linear, LotteryTicket};
pub use task::{ArtifactRef, Task, TaskId, TaskRecord, TaskResult, TaskStatus};
