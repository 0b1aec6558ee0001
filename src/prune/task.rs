//! Units of work exchanged with the executor.
//!
//! A [`Task`] only carries references into the run store; the generator never
//! interprets what the executor does with them. A [`TaskResult`] is the
//! executor's feedback for one task.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SparsityConfig;
use crate::model::{MaskSet, ModelLayout};

/// Identity of a task: the synthetic baseline or a monotonic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "TaskIdRepr", into = "TaskIdRepr")]
pub enum TaskId {
    /// The unpruned starting point.
    Origin,
    /// A generated task.
    Index(u64),
}

impl TaskId {
    /// Check if this is the baseline id.
    pub fn is_origin(&self) -> bool {
        matches!(self, TaskId::Origin)
    }

    /// Label used in artifact keys.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Origin => write!(f, "origin"),
            TaskId::Index(id) => write!(f, "{id}"),
        }
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        TaskId::Index(id)
    }
}

/// Wire form: `"origin"` or a bare integer.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TaskIdRepr {
    Index(u64),
    Label(String),
}

impl TryFrom<TaskIdRepr> for TaskId {
    type Error = String;

    fn try_from(repr: TaskIdRepr) -> Result<Self, Self::Error> {
        match repr {
            TaskIdRepr::Index(id) => Ok(TaskId::Index(id)),
            TaskIdRepr::Label(label) if label == "origin" => Ok(TaskId::Origin),
            TaskIdRepr::Label(label) => Err(format!("invalid task id '{label}'")),
        }
    }
}

impl From<TaskId> for TaskIdRepr {
    fn from(id: TaskId) -> Self {
        match id {
            TaskId::Origin => TaskIdRepr::Label("origin".to_string()),
            TaskId::Index(id) => TaskIdRepr::Index(id),
        }
    }
}

/// Key of a document in the run store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Wrap a store key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Store key.
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pruning round for the executor to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    /// Model to prune.
    pub model_ref: ArtifactRef,
    /// Masks already applied to that model.
    pub masks_ref: ArtifactRef,
    /// Per-op sparsity to request.
    pub config_list_ref: ArtifactRef,
}

/// Executor feedback for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub task_id: TaskId,
    /// Model after structural pruning.
    pub compact_model: ModelLayout,
    /// Masks on the compact model.
    pub compact_masks: MaskSet,
    /// Evaluation score, higher is better.
    pub score: Option<f64>,
}

impl TaskResult {
    /// Create an unscored result.
    pub fn new(task_id: impl Into<TaskId>, compact_model: ModelLayout, compact_masks: MaskSet) -> Self {
        Self {
            task_id: task_id.into(),
            compact_model,
            compact_masks,
            score: None,
        }
    }

    /// Synthetic result for the unpruned baseline.
    pub fn origin(model: ModelLayout, masks: MaskSet) -> Self {
        Self::new(TaskId::Origin, model, masks)
    }

    /// Attach a score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Lifecycle of an emitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Finished,
}

/// Audit-trail entry for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: Task,
    pub status: TaskStatus,
    pub score: Option<f64>,
    /// Achieved sparsity per group relative to the original model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current2origin: Option<Vec<SparsityConfig>>,
}

impl TaskRecord {
    /// Record for a freshly emitted task.
    pub fn pending(task: Task) -> Self {
        Self {
            task,
            status: TaskStatus::Pending,
            score: None,
            current2origin: None,
        }
    }

    /// Id of the recorded task.
    pub fn task_id(&self) -> TaskId {
        self.task.task_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId::Origin.to_string(), "origin");
        assert_eq!(TaskId::Index(7).to_string(), "7");
        assert_eq!(TaskId::from(3).label(), "3");
    }

    #[test]
    fn test_task_id_wire_form() {
        assert_eq!(serde_json::to_string(&TaskId::Origin).expect("serialize"), "\"origin\"");
        assert_eq!(serde_json::to_string(&TaskId::Index(12)).expect("serialize"), "12");
        let parsed: TaskId = serde_json::from_str("4").expect("parse");
        assert_eq!(parsed, TaskId::Index(4));
        let parsed: TaskId = serde_json::from_str("\"origin\"").expect("parse");
        assert!(parsed.is_origin());
    }

    #[test]
    fn test_task_id_rejects_other_labels() {
        assert!(serde_json::from_str::<TaskId>("\"best\"").is_err());
    }

    #[test]
    fn test_task_id_ordering_puts_origin_first() {
        let mut ids = vec![TaskId::Index(2), TaskId::Origin, TaskId::Index(0)];
        ids.sort();
        assert_eq!(ids, vec![TaskId::Origin, TaskId::Index(0), TaskId::Index(2)]);
    }

    #[test]
    fn test_task_result_builder() {
        let result = TaskResult::new(5, ModelLayout::default(), MaskSet::new()).with_score(0.91);
        assert_eq!(result.task_id, TaskId::Index(5));
        assert_eq!(result.score, Some(0.91));
        assert!(TaskResult::origin(ModelLayout::default(), MaskSet::new()).task_id.is_origin());
    }

    #[test]
    fn test_record_json_shape() {
        let task = Task {
            task_id: TaskId::Index(1),
            model_ref: ArtifactRef::new("intermediate_result/origin_compact_model.json"),
            masks_ref: ArtifactRef::new("intermediate_result/origin_compact_model_masks.json"),
            config_list_ref: ArtifactRef::new("intermediate_result/1_config_list.json"),
        };
        let record = TaskRecord::pending(task);
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["task"]["task_id"], 1);
        assert!(value.get("current2origin").is_none());
    }
}
