//! Task generators
//!
//! A generator turns executor feedback into the next pruning task. The
//! executor loop is strictly sequential:
//!
//! ```text
//! init_pending_tasks -> next -> (executor) -> receive_task_result -> next -> ...
//! ```
//!
//! until [`TaskGenerator::next`] returns `None`.
//!
//! - [`IterativeTaskGenerator`]: AGP, Linear and LotteryTicket schedules
//! - [`AnnealingTaskGenerator`]: simulated-annealing search

mod annealing;
mod iterative;
mod state;

pub use annealing::{AnnealState, AnnealingTaskGenerator, Decision};
pub use iterative::{
    AgpTaskGenerator, IterationState, IterativeTaskGenerator, LinearTaskGenerator,
    LotteryTicketTaskGenerator,
};
pub use state::{BestResult, GeneratorCore};

use std::path::PathBuf;

use tracing::info;

use crate::config::{canonicalize, RunSpec, StrategyConfig};
use crate::error::Result;
use crate::model::{MaskSet, ModelLayout};
use crate::prune::schedule::{Agp, Linear, LotteryTicket};
use crate::prune::task::{Task, TaskRecord, TaskResult};
use crate::storage::{LocalStore, RunStore};

/// Feedback-driven producer of pruning tasks.
pub trait TaskGenerator: Send {
    /// Strategy name used in logs.
    fn name(&self) -> &'static str;

    fn core(&self) -> &GeneratorCore;

    fn core_mut(&mut self) -> &mut GeneratorCore;

    /// Whether the generator reached its terminal state.
    fn is_done(&self) -> bool;

    /// Consume the result of a finished task and return the next tasks.
    ///
    /// Returns zero or one task; an empty list means the run is over. Every
    /// artifact a returned task references is written before it returns.
    fn generate_tasks(&mut self, result: &TaskResult) -> Result<Vec<Task>>;

    /// Persist the baseline and queue the first task.
    fn init_pending_tasks(&mut self) -> Result<()> {
        self.core_mut().register_origin()?;
        let origin = self.core().origin_result();
        let tasks = self.generate_tasks(&origin)?;
        self.core_mut().enqueue(tasks);
        Ok(())
    }

    /// Next queued task, marked running.
    fn next(&mut self) -> Option<Task> {
        self.core_mut().pop_pending()
    }

    /// Record a finished task, track the best result and queue follow-ups.
    fn receive_task_result(&mut self, result: TaskResult) -> Result<()> {
        let core = self.core_mut();
        core.finish(&result)?;
        core.update_best(&result)?;
        let tasks = self.generate_tasks(&result)?;
        self.core_mut().enqueue(tasks);
        Ok(())
    }

    fn best_result(&self) -> Option<&BestResult> {
        self.core().best()
    }

    /// Every task emitted so far, origin first.
    fn records(&self) -> Vec<&TaskRecord> {
        self.core().records().collect()
    }
}

/// Build the generator configured by `spec`, loading the model layout and
/// masks it points at.
pub fn build_generator(spec: &RunSpec, store: RunStore) -> Result<Box<dyn TaskGenerator>> {
    let (model, masks) = load_inputs(spec)?;
    build_generator_from_parts(spec, model, masks, store)
}

/// Open a fresh `<log_dir>/<run_id>` directory and build the generator
/// configured by `spec` on top of it.
///
/// The spec and model are checked before the directory is created. Returns
/// the generator and the run directory.
pub fn start_run(spec: &RunSpec) -> Result<(Box<dyn TaskGenerator>, PathBuf)> {
    let (model, masks) = load_inputs(spec)?;
    spec.validate()?;
    canonicalize(&model, &spec.config_list)?;

    let local = LocalStore::new_run(&spec.log_dir)?;
    let run_dir = local.root().to_path_buf();
    info!(run_dir = %run_dir.display(), strategy = spec.strategy.name(), "starting pruning run");
    let generator = build_generator_from_parts(spec, model, masks, RunStore::new(local))?;
    Ok((generator, run_dir))
}

fn load_inputs(spec: &RunSpec) -> Result<(ModelLayout, MaskSet)> {
    let model = ModelLayout::from_file(&spec.model)?;
    let masks = match &spec.masks {
        Some(path) => MaskSet::from_file(path)?,
        None => MaskSet::new(),
    };
    Ok((model, masks))
}

/// Build the generator configured by `spec` for an already-loaded model.
pub fn build_generator_from_parts(
    spec: &RunSpec,
    model: ModelLayout,
    masks: MaskSet,
    store: RunStore,
) -> Result<Box<dyn TaskGenerator>> {
    spec.validate()?;
    let core = GeneratorCore::new(model, masks, &spec.config_list, store)?;
    let generator: Box<dyn TaskGenerator> = match &spec.strategy {
        StrategyConfig::Agp { total_iteration } => {
            Box::new(IterativeTaskGenerator::new(Agp, *total_iteration, core)?)
        }
        StrategyConfig::Linear { total_iteration } => {
            Box::new(IterativeTaskGenerator::new(Linear, *total_iteration, core)?)
        }
        StrategyConfig::LotteryTicket { total_iteration } => {
            Box::new(IterativeTaskGenerator::new(LotteryTicket, *total_iteration, core)?)
        }
        StrategyConfig::SimulatedAnnealing(config) => {
            Box::new(AnnealingTaskGenerator::new(config.clone(), core, spec.seed)?)
        }
    };
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnnealingConfig, UserSparsityConfig};
    use crate::storage::InMemoryStore;
    use tempfile::TempDir;

    fn spec(strategy: StrategyConfig) -> RunSpec {
        RunSpec {
            model: PathBuf::from("unused.json"),
            masks: None,
            log_dir: PathBuf::from("."),
            seed: Some(4),
            strategy,
            config_list: vec![UserSparsityConfig::total_sparsity(0.5).with_op_types(["Linear"])],
        }
    }

    fn layout() -> ModelLayout {
        ModelLayout::default()
            .with_op("fc1", "Linear", 400)
            .with_op("fc2", "Linear", 100)
    }

    #[test]
    fn test_build_each_strategy() {
        let cases = [
            (StrategyConfig::Agp { total_iteration: 2 }, "agp"),
            (StrategyConfig::Linear { total_iteration: 2 }, "linear"),
            (StrategyConfig::LotteryTicket { total_iteration: 2 }, "lottery_ticket"),
            (
                StrategyConfig::SimulatedAnnealing(AnnealingConfig::default()),
                "simulated_annealing",
            ),
        ];
        for (strategy, name) in cases {
            let generator = build_generator_from_parts(
                &spec(strategy),
                layout(),
                MaskSet::new(),
                RunStore::new(InMemoryStore::new()),
            )
            .expect("generator should build");
            assert_eq!(generator.name(), name);
            assert!(!generator.is_done());
        }
    }

    #[test]
    fn test_build_rejects_invalid_strategy() {
        let result = build_generator_from_parts(
            &spec(StrategyConfig::Linear { total_iteration: 0 }),
            layout(),
            MaskSet::new(),
            RunStore::new(InMemoryStore::new()),
        );
        assert!(matches!(result, Err(e) if e.is_user_error()));
    }

    #[test]
    fn test_records_track_lifecycle() {
        let mut generator = build_generator_from_parts(
            &spec(StrategyConfig::Linear { total_iteration: 1 }),
            layout(),
            MaskSet::new(),
            RunStore::new(InMemoryStore::new()),
        )
        .expect("generator should build");
        generator.init_pending_tasks().expect("init");
        let task = generator.next().expect("task");

        let statuses: Vec<_> = generator.records().iter().map(|r| (r.task_id(), r.status)).collect();
        assert_eq!(
            statuses,
            vec![
                (crate::prune::TaskId::Origin, crate::prune::TaskStatus::Finished),
                (task.task_id, crate::prune::TaskStatus::Running),
            ]
        );

        generator
            .receive_task_result(TaskResult::new(task.task_id, layout(), MaskSet::new()).with_score(0.7))
            .expect("feedback");
        assert_eq!(generator.best_result().map(|b| b.task_id), Some(task.task_id));
        assert_eq!(generator.records().len(), 3);
    }

    #[test]
    fn test_build_generator_missing_model_file() {
        let result = build_generator(
            &spec(StrategyConfig::Agp { total_iteration: 1 }),
            RunStore::new(InMemoryStore::new()),
        );
        assert!(matches!(result, Err(crate::error::PodarError::Io { .. })));
    }

    fn spec_in(dir: &TempDir, config_list: Vec<UserSparsityConfig>) -> RunSpec {
        let model = dir.path().join("layout.json");
        std::fs::write(&model, serde_json::to_vec(&layout()).expect("serialization should succeed"))
            .expect("write should succeed");
        RunSpec {
            model,
            log_dir: dir.path().join("runs"),
            config_list,
            ..spec(StrategyConfig::Linear { total_iteration: 2 })
        }
    }

    #[test]
    fn test_start_run_writes_under_log_dir() {
        let dir = TempDir::new().expect("temp dir should be created");
        let spec = spec_in(&dir, vec![UserSparsityConfig::total_sparsity(0.5).with_op_types(["Linear"])]);

        let (mut generator, run_dir) = start_run(&spec).expect("run should start");
        assert_eq!(run_dir.parent(), Some(spec.log_dir.as_path()));
        generator.init_pending_tasks().expect("init");
        assert!(run_dir.join("intermediate_result").join("origin_task.json").is_file());
        assert!(run_dir.join("intermediate_result").join("0_config_list.json").is_file());
    }

    #[test]
    fn test_start_run_config_error_creates_no_run_dir() {
        let dir = TempDir::new().expect("temp dir should be created");
        let spec = spec_in(&dir, vec![UserSparsityConfig::default().with_op_types(["Linear"])]);

        let err = start_run(&spec).err().expect("config should be rejected");
        assert!(err.is_user_error());
        assert!(!spec.log_dir.exists());
    }
}
