//! CLI command implementations

mod schedule;
mod validate;


use std::path::Path;

use crate::cli::{init_tracing, LogLevel};
use crate::config::{canonicalize, Cli, Command, RunSpec, SparsityConfig};
use crate::error::Result;
use crate::model::{MaskSet, ModelLayout};

pub use schedule::{schedule_rows, temperature_ladder, ScheduleRow};
pub use validate::{format_groups, format_inputs_info, format_strategy_info};

/// A run spec together with the model it points at.
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub spec: RunSpec,
    pub model: ModelLayout,
    pub masks: MaskSet,
    pub groups: Vec<SparsityConfig>,
}

/// Load a run spec, its model layout and masks, and canonicalize its config list.
pub fn load_run(path: &Path) -> Result<LoadedRun> {
    let spec = RunSpec::from_file(path)?;
    let model = ModelLayout::from_file(&spec.model)?;
    let masks = match &spec.masks {
        Some(masks) => MaskSet::from_file(masks)?,
        None => MaskSet::new(),
    };
    let groups = canonicalize(&model, &spec.config_list)?;
    Ok(LoadedRun {
        spec,
        model,
        masks,
        groups,
    })
}

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    // Configure output based on verbose/quiet flags
    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };
    init_tracing(log_level);

    match cli.command {
        Command::Validate(args) => validate::run_validate(args, log_level),
        Command::Schedule(args) => schedule::run_schedule(args, log_level),
    }
}
