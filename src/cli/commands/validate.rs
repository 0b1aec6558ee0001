//! Validate command implementation

use super::{load_run, LoadedRun};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{RunSpec, SparsityConfig, StrategyConfig, ValidateArgs};

/// Format the strategy and its parameters as a string
pub fn format_strategy_info(spec: &RunSpec) -> String {
    match &spec.strategy {
        StrategyConfig::Agp { total_iteration }
        | StrategyConfig::Linear { total_iteration }
        | StrategyConfig::LotteryTicket { total_iteration } => format!(
            "  Strategy: {} (total_iteration: {total_iteration})",
            spec.strategy.name()
        ),
        StrategyConfig::SimulatedAnnealing(config) => format!(
            "  Strategy: {}\n    Temperature: {} -> {} (cool down {})\n    Perturbation magnitude: {}\n    Accepted candidates before stop: {}",
            spec.strategy.name(),
            config.start_temperature,
            config.stop_temperature,
            config.cool_down_rate,
            config.perturbation_magnitude,
            config.cooling_steps()
        ),
    }
}

/// Format the model, masks and run directory as a string
pub fn format_inputs_info(run: &LoadedRun) -> String {
    let mut lines = vec![format!(
        "  Model: {} ({} ops, {} weights)",
        run.spec.model.display(),
        run.model.len(),
        run.model.total_numel()
    )];
    match &run.spec.masks {
        Some(path) => lines.push(format!("  Masks: {} ({} ops)", path.display(), run.masks.len())),
        None => lines.push("  Masks: none".to_string()),
    }
    lines.push(format!("  Log dir: {}", run.spec.log_dir.display()));
    if let Some(seed) = run.spec.seed {
        lines.push(format!("  Seed: {seed}"));
    }
    lines.join("\n")
}

/// Format canonical groups as a string
pub fn format_groups(groups: &[SparsityConfig]) -> String {
    let mut lines = vec![format!("  Groups: {}", groups.len())];
    for (i, group) in groups.iter().enumerate() {
        lines.push(format!(
            "    [{i}] total_sparsity={} ops={}",
            group.total_sparsity,
            group.op_names.join(", ")
        ));
    }
    lines.join("\n")
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("Validating config: {}", args.config.display()));

    let run = load_run(&args.config).map_err(|e| format!("Config error: {e}"))?;

    log(level, LogLevel::Normal, "Configuration valid");
    log(level, LogLevel::Normal, &format_strategy_info(&run.spec));
    log(level, LogLevel::Normal, &format_inputs_info(&run));
    log(level, LogLevel::Normal, &format_groups(&run.groups));
    Ok(())
}
