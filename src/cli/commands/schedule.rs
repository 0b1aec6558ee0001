//! Schedule command implementation

use super::load_run;
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{AnnealingConfig, ScheduleArgs, SparsityConfig, StrategyConfig};
use crate::error::Result;
use crate::prune::{incremental_sparsity, Agp, CumulativeSchedule, Linear, LotteryTicket};

/// One row of a functional schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleRow {
    pub iteration: usize,
    pub group: usize,
    pub cumulative: f64,
    pub incremental: f64,
}

/// Cumulative and incremental targets per iteration and group, assuming
/// every round lands exactly on its cumulative target.
pub fn schedule_rows(
    schedule: &dyn CumulativeSchedule,
    total_iteration: usize,
    groups: &[SparsityConfig],
) -> Result<Vec<ScheduleRow>> {
    let mut rows = Vec::new();
    let mut achieved = vec![0.0; groups.len()];
    for iteration in schedule.first_iteration()..=total_iteration {
        for (group, (config, achieved)) in groups.iter().zip(achieved.iter_mut()).enumerate() {
            let cumulative = schedule.cumulative_target(iteration, total_iteration, config.total_sparsity);
            let incremental = incremental_sparsity(cumulative, *achieved)?;
            rows.push(ScheduleRow {
                iteration,
                group,
                cumulative,
                incremental,
            });
            *achieved = cumulative.max(*achieved);
        }
    }
    Ok(rows)
}

/// Temperatures after each accepted candidate, starting at the start
/// temperature and ending on the first value below the stop temperature.
pub fn temperature_ladder(config: &AnnealingConfig) -> Vec<f64> {
    let mut ladder = vec![config.start_temperature];
    let mut temperature = config.start_temperature;
    while temperature >= config.stop_temperature {
        temperature *= config.cool_down_rate;
        ladder.push(temperature);
    }
    ladder
}

fn format_rows(rows: &[ScheduleRow]) -> String {
    let mut lines = vec!["  iter  group  cumulative  incremental".to_string()];
    for row in rows {
        lines.push(format!(
            "  {:>4}  {:>5}  {:>10.6}  {:>11.6}",
            row.iteration, row.group, row.cumulative, row.incremental
        ));
    }
    lines.join("\n")
}

fn format_ladder(ladder: &[f64]) -> String {
    let mut lines = vec!["  step  temperature".to_string()];
    for (step, temperature) in ladder.iter().enumerate() {
        lines.push(format!("  {step:>4}  {temperature:>11.4}"));
    }
    lines.push(format!("  stops after {} accepted candidates", ladder.len() - 1));
    lines.join("\n")
}

pub fn run_schedule(args: ScheduleArgs, level: LogLevel) -> Result<(), String> {
    let run = load_run(&args.config).map_err(|e| format!("Config error: {e}"))?;
    log(
        level,
        LogLevel::Normal,
        &format!("Strategy: {} ({} groups)", run.spec.strategy.name(), run.groups.len()),
    );

    let (schedule, total_iteration): (Box<dyn CumulativeSchedule>, usize) = match &run.spec.strategy {
        StrategyConfig::Agp { total_iteration } => (Box::new(Agp), *total_iteration),
        StrategyConfig::Linear { total_iteration } => (Box::new(Linear), *total_iteration),
        StrategyConfig::LotteryTicket { total_iteration } => (Box::new(LotteryTicket), *total_iteration),
        StrategyConfig::SimulatedAnnealing(config) => {
            log(level, LogLevel::Normal, &format_ladder(&temperature_ladder(config)));
            return Ok(());
        }
    };

    let rows = schedule_rows(schedule.as_ref(), total_iteration, &run.groups)
        .map_err(|e| format!("Schedule error: {e}"))?;
    log(level, LogLevel::Normal, &format_rows(&rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_land_on_target() {
        let groups = vec![SparsityConfig::new(["fc1"], 0.5), SparsityConfig::new(["fc2"], 0.8)];
        let rows = schedule_rows(&Agp, 10, &groups).expect("rows");
        assert_eq!(rows.len(), 22);
        let last = rows[rows.len() - 1];
        assert_eq!((last.iteration, last.group), (10, 1));
        assert!((last.cumulative - 0.8).abs() < 1e-12);
        for row in &rows {
            assert!((0.0..=1.0).contains(&row.incremental));
        }
    }

    #[test]
    fn test_rows_compose_to_cumulative() {
        let groups = vec![SparsityConfig::new(["fc1"], 0.9)];
        let rows = schedule_rows(&LotteryTicket, 4, &groups).expect("rows");
        assert_eq!(rows[0].iteration, 1);
        let density: f64 = rows.iter().map(|r| 1.0 - r.incremental).product();
        assert!((1.0 - density - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_default_ladder_has_sixteen_steps() {
        let ladder = temperature_ladder(&AnnealingConfig::default());
        assert_eq!(ladder.len(), 17);
        assert_eq!(ladder[0], 100.0);
        assert!(ladder[15] >= 20.0);
        assert!(ladder[16] < 20.0);
        assert_eq!(ladder.len() - 1, AnnealingConfig::default().cooling_steps());
    }
}
