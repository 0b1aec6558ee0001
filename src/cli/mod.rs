//! CLI module for podar
//!
//! Command handlers and output utilities for the `podar` binary.

mod commands;
mod logging;

pub use commands::{
    format_groups, format_inputs_info, format_strategy_info, load_run, run_command, schedule_rows,
    temperature_ladder, LoadedRun, ScheduleRow,
};
pub use logging::{init_tracing, LogLevel};

// Re-export Cli from config for convenience
pub use crate::config::Cli;
