//! Podar: pruning task generation for model compression
//!
//! Podar decides what to prune next. An external executor prunes and
//! evaluates models; podar turns user sparsity goals into a sequence of
//! per-op sparsity tasks, either along a fixed schedule (AGP, Linear,
//! LotteryTicket) or by simulated-annealing search over sparsity
//! distributions.
//!
//! # Architecture
//!
//! - `config`: user config lists, canonical groups and YAML run specs
//! - `model`: weight layouts, masks and sparsity telemetry
//! - `prune`: allocation, schedules and task generators
//! - `storage`: run-scoped artifact persistence
//! - `protocol`: tuner/trainer command encoding
//! - `cli`: the `podar` binary

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod prune;
pub mod storage;

pub use error::{PodarError, Result};
