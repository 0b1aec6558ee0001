//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Podar: pruning schedule and search engine
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "podar")]
#[command(author = "PAIML")]
#[command(version)]
#[command(about = "Iterative pruning schedules and simulated-annealing sparsity search")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a run configuration and print its canonical groups
    Validate(ValidateArgs),

    /// Print the sparsity schedule or temperature ladder of a run
    Schedule(ScheduleArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML run configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the schedule command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ScheduleArgs {
    /// Path to YAML run configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}
