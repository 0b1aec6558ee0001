//! YAML run specification.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::user::UserSparsityConfig;
use crate::error::{PodarError, Result};

/// Simulated-annealing parameters.
///
/// Defaults: start 100, stop 20, cool-down 0.9, perturbation 0.35.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnealingConfig {
    /// Initial temperature.
    #[serde(default = "default_start_temperature")]
    pub start_temperature: f64,
    /// Search stops once the temperature drops below this.
    #[serde(default = "default_stop_temperature")]
    pub stop_temperature: f64,
    /// Temperature multiplier applied on every accepted candidate.
    #[serde(default = "default_cool_down_rate")]
    pub cool_down_rate: f64,
    /// Perturbation magnitude at the start temperature.
    #[serde(default = "default_perturbation_magnitude")]
    pub perturbation_magnitude: f64,
    /// Rejection-sampling attempts per group before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_start_temperature() -> f64 {
    100.0
}

fn default_stop_temperature() -> f64 {
    20.0
}

fn default_cool_down_rate() -> f64 {
    0.9
}

fn default_perturbation_magnitude() -> f64 {
    0.35
}

pub(crate) fn default_max_attempts() -> usize {
    10_000
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            start_temperature: default_start_temperature(),
            stop_temperature: default_stop_temperature(),
            cool_down_rate: default_cool_down_rate(),
            perturbation_magnitude: default_perturbation_magnitude(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl AnnealingConfig {
    /// Set the start temperature.
    pub fn with_start_temperature(mut self, temperature: f64) -> Self {
        self.start_temperature = temperature;
        self
    }

    /// Set the stop temperature.
    pub fn with_stop_temperature(mut self, temperature: f64) -> Self {
        self.stop_temperature = temperature;
        self
    }

    /// Set the cool-down rate.
    pub fn with_cool_down_rate(mut self, rate: f64) -> Self {
        self.cool_down_rate = rate;
        self
    }

    /// Set the perturbation magnitude.
    pub fn with_perturbation_magnitude(mut self, magnitude: f64) -> Self {
        self.perturbation_magnitude = magnitude;
        self
    }

    /// Set the rejection-sampling retry cap.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.stop_temperature > 0.0) {
            return Err(PodarError::config(
                "stop_temperature",
                format!("must be positive, got {}", self.stop_temperature),
            ));
        }
        if self.start_temperature < self.stop_temperature {
            return Err(PodarError::config(
                "start_temperature",
                format!(
                    "start_temperature ({}) must not be below stop_temperature ({})",
                    self.start_temperature, self.stop_temperature
                ),
            ));
        }
        if !(self.cool_down_rate > 0.0 && self.cool_down_rate < 1.0) {
            return Err(PodarError::config(
                "cool_down_rate",
                format!("must be in (0, 1), got {}", self.cool_down_rate),
            ));
        }
        if !(self.perturbation_magnitude >= 0.0) {
            return Err(PodarError::config(
                "perturbation_magnitude",
                format!("must be non-negative, got {}", self.perturbation_magnitude),
            ));
        }
        if self.max_attempts == 0 {
            return Err(PodarError::config("max_attempts", "must be at least 1"));
        }
        Ok(())
    }

    /// Number of accepted candidates before the search stops.
    pub fn cooling_steps(&self) -> usize {
        let mut temperature = self.start_temperature;
        let mut steps = 0;
        while temperature >= self.stop_temperature {
            temperature *= self.cool_down_rate;
            steps += 1;
        }
        steps
    }
}

/// Task generation strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Cubic schedule (Zhu & Gupta, 2017).
    Agp {
        /// Number of pruning iterations.
        total_iteration: usize,
    },
    /// Linear schedule.
    Linear {
        /// Number of pruning iterations.
        total_iteration: usize,
    },
    /// Geometric schedule (Frankle & Carbin, 2018).
    LotteryTicket {
        /// Number of pruning iterations.
        total_iteration: usize,
    },
    /// Simulated-annealing search over sparsity distributions.
    SimulatedAnnealing(AnnealingConfig),
}

impl StrategyConfig {
    /// Strategy name as written in YAML.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::Agp { .. } => "agp",
            StrategyConfig::Linear { .. } => "linear",
            StrategyConfig::LotteryTicket { .. } => "lottery_ticket",
            StrategyConfig::SimulatedAnnealing(_) => "simulated_annealing",
        }
    }

    /// Validate the strategy parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            StrategyConfig::Agp { total_iteration }
            | StrategyConfig::Linear { total_iteration }
            | StrategyConfig::LotteryTicket { total_iteration } => {
                if *total_iteration == 0 {
                    return Err(PodarError::config("total_iteration", "must be at least 1"));
                }
                Ok(())
            }
            StrategyConfig::SimulatedAnnealing(config) => config.validate(),
        }
    }
}

/// Complete run specification loaded from YAML.
///
/// # Example
///
/// ```
/// use podar::config::RunSpec;
///
/// let yaml = r#"
/// model: layout.json
/// strategy:
///   type: agp
///   total_iteration: 10
/// config_list:
///   - op_types: [Linear]
///     total_sparsity: 0.5
/// "#;
/// let spec: RunSpec = serde_yaml::from_str(yaml).unwrap();
/// assert_eq!(spec.strategy.name(), "agp");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSpec {
    /// Original model weight layout (JSON or YAML).
    pub model: PathBuf,
    /// Pre-existing masks on the original model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masks: Option<PathBuf>,
    /// Root directory for run artifacts.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Seed for the random stream; OS entropy when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Task generation strategy.
    pub strategy: StrategyConfig,
    /// User sparsity config list.
    pub config_list: Vec<UserSparsityConfig>,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

impl RunSpec {
    /// Load and validate a run spec. Relative paths resolve against the
    /// spec file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PodarError::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        let mut spec: RunSpec = serde_yaml::from_str(&content)?;
        if let Some(base) = path.parent() {
            spec.resolve_paths(base);
        }
        spec.validate()?;
        Ok(spec)
    }

    /// Make relative paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.model);
        if let Some(masks) = self.masks.as_mut() {
            resolve(masks);
        }
        resolve(&mut self.log_dir);
    }

    /// Validate everything that can be checked without the model.
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        if self.config_list.is_empty() {
            return Err(PodarError::config("config_list", "must not be empty"));
        }
        Ok(())
    }
}
