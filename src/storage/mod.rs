//! Artifact storage for pruning runs.
//!
//! Every snapshot, config list and task record of a run lives under one
//! run-scoped key space. Writes complete before any task referencing them is
//! handed to the executor.
//!
//! # Example
//!
//! ```
//! use podar::storage::{ArtifactStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.put("intermediate_result/0_config_list.json", b"[]").unwrap();
//! assert!(store.exists("intermediate_result/0_config_list.json").unwrap());
//! ```

mod local;
mod memory;
mod run;
mod traits;

pub use local::{run_id, LocalStore};
pub use memory::InMemoryStore;
pub use run::{RunStore, Snapshot, BEST_DIR, INTERMEDIATE_DIR};
pub use traits::{validate_key, ArtifactStore};
