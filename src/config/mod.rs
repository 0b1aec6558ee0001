//! Sparsity configuration
//!
//! User config lists, their canonical groups, the per-op config lists
//! exported with every task, the YAML run specification and the CLI
//! arguments that point at it.

mod canonical;
mod cli;
mod run;
mod sparsity;
mod user;

pub(crate) use run::default_max_attempts;
pub use canonical::canonicalize;
pub use cli::{Cli, Command, ScheduleArgs, ValidateArgs};
pub use run::{AnnealingConfig, RunSpec, StrategyConfig};
pub use sparsity::{ConfigList, SparsityConfig};
pub use user::UserSparsityConfig;
