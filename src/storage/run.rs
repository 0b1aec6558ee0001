//! Typed JSON documents of one pruning run.
//!
//! Layout inside the store:
//!
//! ```text
//! intermediate_result/{label}_compact_model.json
//! intermediate_result/{label}_compact_model_masks.json
//! intermediate_result/{label}_config_list.json
//! intermediate_result/{label}_task.json
//! best_result/compact_model.json
//! best_result/compact_model_masks.json
//! best_result/config_list.json
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::traits::ArtifactStore;
use crate::config::ConfigList;
use crate::error::Result;
use crate::model::{MaskSet, ModelLayout};
use crate::prune::{ArtifactRef, TaskId, TaskRecord};

/// Directory of per-task documents.
pub const INTERMEDIATE_DIR: &str = "intermediate_result";
/// Directory of the best result so far.
pub const BEST_DIR: &str = "best_result";

const MODEL_SUFFIX: &str = "compact_model.json";
const MASKS_SUFFIX: &str = "compact_model_masks.json";
const CONFIG_LIST_SUFFIX: &str = "config_list.json";
const TASK_SUFFIX: &str = "task.json";

/// References to a stored model/masks pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub model_ref: ArtifactRef,
    pub masks_ref: ArtifactRef,
}

/// Run-scoped document store over any [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct RunStore {
    backend: Arc<dyn ArtifactStore>,
}

impl RunStore {
    /// Wrap a backend.
    pub fn new(backend: impl ArtifactStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wrap a backend shared with other owners.
    pub fn from_shared(backend: Arc<dyn ArtifactStore>) -> Self {
        Self { backend }
    }

    /// Underlying backend.
    pub fn backend(&self) -> &dyn ArtifactStore {
        self.backend.as_ref()
    }

    /// Key of a per-task document.
    pub fn intermediate_key(label: &str, suffix: &str) -> String {
        format!("{INTERMEDIATE_DIR}/{label}_{suffix}")
    }

    fn best_key(suffix: &str) -> String {
        format!("{BEST_DIR}/{suffix}")
    }

    /// Serialize a value as pretty JSON under `key`.
    pub fn put_json<T: Serialize>(&self, key: String, value: &T) -> Result<ArtifactRef> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.backend.put(&key, &bytes)?;
        Ok(ArtifactRef::new(key))
    }

    /// Load and deserialize the JSON document behind a reference.
    pub fn get_json<T: DeserializeOwned>(&self, artifact: &ArtifactRef) -> Result<T> {
        let bytes = self.backend.get(artifact.key())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist a model/masks pair under a task label.
    pub fn save_snapshot(&self, label: &str, model: &ModelLayout, masks: &MaskSet) -> Result<Snapshot> {
        Ok(Snapshot {
            model_ref: self.put_json(Self::intermediate_key(label, MODEL_SUFFIX), model)?,
            masks_ref: self.put_json(Self::intermediate_key(label, MASKS_SUFFIX), masks)?,
        })
    }

    /// Persist the config list requested by a task.
    pub fn save_config_list(&self, label: &str, config_list: &ConfigList) -> Result<ArtifactRef> {
        self.put_json(Self::intermediate_key(label, CONFIG_LIST_SUFFIX), config_list)
    }

    /// Persist a task's audit record.
    pub fn save_record(&self, record: &TaskRecord) -> Result<ArtifactRef> {
        self.put_json(Self::intermediate_key(&record.task_id().label(), TASK_SUFFIX), record)
    }

    /// Load a task's audit record.
    pub fn load_record(&self, task_id: TaskId) -> Result<TaskRecord> {
        self.get_json(&ArtifactRef::new(Self::intermediate_key(&task_id.label(), TASK_SUFFIX)))
    }

    /// Persist the best snapshot and its config list, replacing the previous best.
    pub fn save_best(
        &self,
        model: &ModelLayout,
        masks: &MaskSet,
        config_list: &ConfigList,
    ) -> Result<(Snapshot, ArtifactRef)> {
        let snapshot = Snapshot {
            model_ref: self.put_json(Self::best_key(MODEL_SUFFIX), model)?,
            masks_ref: self.put_json(Self::best_key(MASKS_SUFFIX), masks)?,
        };
        let config_list_ref = self.put_json(Self::best_key(CONFIG_LIST_SUFFIX), config_list)?;
        Ok((snapshot, config_list_ref))
    }

    /// Load a stored model layout.
    pub fn load_model(&self, artifact: &ArtifactRef) -> Result<ModelLayout> {
        self.get_json(artifact)
    }

    /// Load stored masks.
    pub fn load_masks(&self, artifact: &ArtifactRef) -> Result<MaskSet> {
        self.get_json(artifact)
    }

    /// Load a stored config list.
    pub fn load_config_list(&self, artifact: &ArtifactRef) -> Result<ConfigList> {
        self.get_json(artifact)
    }
}
