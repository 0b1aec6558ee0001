//! Simulated-annealing search over per-op sparsity distributions.
//!
//! Every move perturbs all ops of a group together and projects the result
//! back onto the group's weighted-average constraint with
//! [`SparsityAllocator::rescale`]. The search maximizes the executor's score.
//!
//! ```text
//! CandidateGenerated -> AwaitingFeedback -> Accepted | Rejected -> CandidateGenerated
//!                                        \-> Stopped (temperature < stop)
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::state::GeneratorCore;
use super::TaskGenerator;
use crate::config::{AnnealingConfig, ConfigList, SparsityConfig};
use crate::error::{PodarError, Result};
use crate::model::weight_element_counts;
use crate::prune::allocator::SparsityAllocator;
use crate::prune::task::{Task, TaskResult};
use crate::storage::Snapshot;

/// Search state. Sparsity vectors are per group, sorted ascending and indexed
/// by the group's ops ordered by size.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealState {
    pub temperature: f64,
    pub current_sparsity: Option<Vec<Vec<f64>>>,
    pub current_score: Option<f64>,
    pub candidate: Vec<Vec<f64>>,
}

/// Outcome of scoring a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// First scored candidate, adopted without cooling.
    Initial,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No candidate has been drawn yet.
    Fresh,
    AwaitingFeedback,
    Stopped,
}

/// Simulated-annealing task generator.
///
/// Every task prunes the origin model from scratch with absolute per-op
/// sparsity, so tasks are independent of each other.
#[derive(Debug)]
pub struct AnnealingTaskGenerator {
    core: GeneratorCore,
    config: AnnealingConfig,
    allocator: SparsityAllocator,
    /// Group targets relative to the weights left by the origin masks.
    targets: Vec<SparsityConfig>,
    state: AnnealState,
    phase: Phase,
    base: Option<Snapshot>,
    rng: StdRng,
}

impl AnnealingTaskGenerator {
    /// Build the generator; `seed` fixes the random stream, `None` draws
    /// it from the OS.
    pub fn new(config: AnnealingConfig, core: GeneratorCore, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let (weights, masked) =
            weight_element_counts(core.origin_model(), core.target(), core.origin_masks())?;
        let allocator = SparsityAllocator::new(weights, masked).with_max_attempts(config.max_attempts);
        let mut targets = core.target().to_vec();
        allocator.adjust_target_sparsity(&mut targets)?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let state = AnnealState {
            temperature: config.start_temperature,
            current_sparsity: None,
            current_score: None,
            candidate: Vec::new(),
        };
        Ok(Self {
            core,
            config,
            allocator,
            targets,
            state,
            phase: Phase::Fresh,
            base: None,
            rng,
        })
    }

    pub fn state(&self) -> &AnnealState {
        &self.state
    }

    pub fn temperature(&self) -> f64 {
        self.state.temperature
    }

    pub fn config(&self) -> &AnnealingConfig {
        &self.config
    }

    /// Group targets after compensating for pre-existing masks.
    pub fn adjusted_targets(&self) -> &[SparsityConfig] {
        &self.targets
    }

    /// Score the pending candidate against the current one.
    ///
    /// An accepted candidate becomes current and cools the temperature; a
    /// rejected one is dropped and the temperature is unchanged.
    pub fn decide(&mut self, score: f64) -> Decision {
        let Some(current_score) = self.state.current_score else {
            self.state.current_score = Some(score);
            self.state.current_sparsity = Some(self.state.candidate.clone());
            return Decision::Initial;
        };

        let delta_e = (score - current_score).abs();
        let probability = (-delta_e / self.state.temperature).exp();
        let accept = current_score < score || self.rng.random::<f64>() < probability;
        debug!(
            score,
            current_score,
            delta_e,
            probability,
            temperature = self.state.temperature,
            accept,
            "annealing decision"
        );

        if accept {
            self.state.current_score = Some(score);
            self.state.current_sparsity = Some(self.state.candidate.clone());
            self.state.temperature *= self.config.cool_down_rate;
            Decision::Accepted
        } else {
            Decision::Rejected
        }
    }

    fn sample_initial(&mut self) -> Result<Vec<Vec<f64>>> {
        self.targets
            .iter()
            .map(|group| self.allocator.sample_initial(group, &mut self.rng))
            .collect()
    }

    fn perturb_current(&mut self) -> Result<Vec<Vec<f64>>> {
        let magnitude =
            self.state.temperature / self.config.start_temperature * self.config.perturbation_magnitude;
        let current = self.state.current_sparsity.clone().unwrap_or_default();
        self.targets
            .iter()
            .zip(&current)
            .map(|(group, sparsity)| self.allocator.perturb(group, sparsity, magnitude, &mut self.rng))
            .collect()
    }

    /// Export the candidate as absolute per-op sparsity.
    fn candidate_config_list(&self) -> Result<ConfigList> {
        let mut config_list = ConfigList::new();
        for (group, sparsity) in self.targets.iter().zip(&self.state.candidate) {
            config_list.extend(self.allocator.to_config_list(group, sparsity)?);
        }
        self.allocator.recover_real_sparsity(&mut config_list);
        Ok(config_list)
    }
}

impl TaskGenerator for AnnealingTaskGenerator {
    fn name(&self) -> &'static str {
        "simulated_annealing"
    }

    fn core(&self) -> &GeneratorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GeneratorCore {
        &mut self.core
    }

    fn is_done(&self) -> bool {
        self.phase == Phase::Stopped
    }

    fn generate_tasks(&mut self, result: &TaskResult) -> Result<Vec<Task>> {
        let (snapshot, _) = self.core.observe(result)?;

        match self.phase {
            Phase::Stopped => return Ok(Vec::new()),
            Phase::Fresh => {
                self.base = Some(snapshot.clone());
                self.state.candidate = self.sample_initial()?;
            }
            Phase::AwaitingFeedback => {
                let score = result
                    .score
                    .or_else(|| self.core.score_of(result.task_id))
                    .ok_or_else(|| PodarError::MissingScore {
                        task_id: result.task_id.label(),
                    })?;
                self.decide(score);

                if self.state.temperature < self.config.stop_temperature {
                    info!(
                        temperature = self.state.temperature,
                        best_score = ?self.state.current_score,
                        "annealing stopped"
                    );
                    self.phase = Phase::Stopped;
                    return Ok(Vec::new());
                }
                self.state.candidate = self.perturb_current()?;
            }
        }

        let config_list = self.candidate_config_list()?;
        let base = self.base.clone().unwrap_or(snapshot);
        let task = self.core.emit(&base, &config_list)?;
        self.phase = Phase::AwaitingFeedback;
        Ok(vec![task])
    }
}
