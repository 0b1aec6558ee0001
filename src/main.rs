//! Podar CLI
//!
//! Inspect pruning runs before handing them to an executor.
//!
//! # Usage
//!
//! ```bash
//! # Validate a run config and print its canonical groups
//! podar validate run.yaml
//!
//! # Print the per-iteration sparsity schedule
//! podar schedule run.yaml
//!
//! # Debug logging
//! RUST_LOG=podar=debug podar schedule run.yaml --verbose
//! ```

use clap::Parser;
use podar::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
