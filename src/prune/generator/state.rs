//! State shared by every task generator: the origin model, the canonical
//! target groups, the task audit trail, the pending queue and the best result.

use std::collections::{BTreeMap, VecDeque};

use tracing::info;

use crate::config::{canonicalize, ConfigList, SparsityConfig, UserSparsityConfig};
use crate::error::{PodarError, Result};
use crate::model::{compare_sparsity, MaskSet, ModelLayout, SparsityReport};
use crate::prune::task::{ArtifactRef, Task, TaskId, TaskRecord, TaskResult, TaskStatus};
use crate::storage::{RunStore, Snapshot};

/// Best-scoring task seen so far.
#[derive(Debug, Clone, PartialEq)]
pub struct BestResult {
    pub task_id: TaskId,
    pub score: f64,
    /// Copy of the task's compact model and masks under `best_result/`.
    pub snapshot: Snapshot,
    /// Copy of the task's config list under `best_result/`.
    pub config_list_ref: ArtifactRef,
}

/// Bookkeeping common to all generators.
#[derive(Debug)]
pub struct GeneratorCore {
    store: RunStore,
    origin_model: ModelLayout,
    origin_masks: MaskSet,
    target: Vec<SparsityConfig>,
    records: BTreeMap<TaskId, TaskRecord>,
    pending: VecDeque<TaskId>,
    next_id: u64,
    best: Option<BestResult>,
}

impl GeneratorCore {
    /// Canonicalize the user's config against the origin model.
    ///
    /// Nothing is written to the store here, so configuration errors leave
    /// no artifacts behind. Empty `masks` are replaced by identity masks.
    pub fn new(
        origin_model: ModelLayout,
        masks: MaskSet,
        config_list: &[UserSparsityConfig],
        store: RunStore,
    ) -> Result<Self> {
        let target = canonicalize(&origin_model, config_list)?;
        let origin_masks = if masks.is_empty() {
            MaskSet::identity(&origin_model)
        } else {
            masks
        };
        Ok(Self {
            store,
            origin_model,
            origin_masks,
            target,
            records: BTreeMap::new(),
            pending: VecDeque::new(),
            next_id: 0,
            best: None,
        })
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn origin_model(&self) -> &ModelLayout {
        &self.origin_model
    }

    pub fn origin_masks(&self) -> &MaskSet {
        &self.origin_masks
    }

    /// Canonical target groups, as the user asked for them.
    pub fn target(&self) -> &[SparsityConfig] {
        &self.target
    }

    /// Synthetic feedback for the unpruned baseline.
    pub fn origin_result(&self) -> TaskResult {
        TaskResult::origin(self.origin_model.clone(), self.origin_masks.clone())
    }

    /// Persist the baseline snapshot and config list and record the origin
    /// task as finished.
    pub fn register_origin(&mut self) -> Result<Task> {
        let label = TaskId::Origin.label();
        let snapshot = self
            .store
            .save_snapshot(&label, &self.origin_model, &self.origin_masks)?;
        let config_list: ConfigList = self.target.iter().cloned().collect();
        let config_list_ref = self.store.save_config_list(&label, &config_list)?;

        let task = Task {
            task_id: TaskId::Origin,
            model_ref: snapshot.model_ref,
            masks_ref: snapshot.masks_ref,
            config_list_ref,
        };
        let mut record = TaskRecord::pending(task.clone());
        record.status = TaskStatus::Finished;
        self.store.save_record(&record)?;
        self.records.insert(TaskId::Origin, record);
        Ok(task)
    }

    /// Persist a result's snapshot and compare it with the origin model.
    ///
    /// The per-group `current2origin` sparsity is attached to the task's
    /// record unless the result is the baseline.
    pub fn observe(&mut self, result: &TaskResult) -> Result<(Snapshot, SparsityReport)> {
        if !result.task_id.is_origin() && !self.records.contains_key(&result.task_id) {
            return Err(PodarError::UnknownTask {
                task_id: result.task_id.label(),
            });
        }

        // The baseline snapshot is written once by `register_origin`.
        let registered_origin = self
            .records
            .get(&result.task_id)
            .filter(|record| record.task_id().is_origin())
            .map(|record| Snapshot {
                model_ref: record.task.model_ref.clone(),
                masks_ref: record.task.masks_ref.clone(),
            });
        let snapshot = match registered_origin {
            Some(snapshot) => snapshot,
            None => self.store.save_snapshot(
                &result.task_id.label(),
                &result.compact_model,
                &result.compact_masks,
            )?,
        };
        let report = compare_sparsity(
            &self.origin_model,
            &result.compact_model,
            &result.compact_masks,
            &self.target,
        );
        let achieved: Vec<f64> = report.current2origin.iter().map(|g| g.total_sparsity).collect();
        info!(task_id = %result.task_id, current2origin = ?achieved, "total real sparsity compared with original model");

        if !result.task_id.is_origin() {
            if let Some(record) = self.records.get_mut(&result.task_id) {
                record.current2origin = Some(report.current2origin.clone());
                self.store.save_record(record)?;
            }
        }
        Ok((snapshot, report))
    }

    /// Persist a config list and wrap it in a new task on `base`.
    pub fn emit(&mut self, base: &Snapshot, config_list: &ConfigList) -> Result<Task> {
        let task_id = TaskId::Index(self.next_id);
        let config_list_ref = self.store.save_config_list(&task_id.label(), config_list)?;
        let task = Task {
            task_id,
            model_ref: base.model_ref.clone(),
            masks_ref: base.masks_ref.clone(),
            config_list_ref,
        };
        let record = TaskRecord::pending(task.clone());
        self.store.save_record(&record)?;
        self.records.insert(task_id, record);
        self.next_id += 1;

        info!(task_id = %task_id, ops = config_list.len(), "generated pruning task");
        Ok(task)
    }

    /// Queue tasks for [`GeneratorCore::pop_pending`].
    pub fn enqueue(&mut self, tasks: Vec<Task>) {
        self.pending.extend(tasks.into_iter().map(|t| t.task_id));
    }

    /// Pop the oldest pending task and mark it running.
    pub fn pop_pending(&mut self) -> Option<Task> {
        let task_id = self.pending.pop_front()?;
        let record = self.records.get_mut(&task_id)?;
        record.status = TaskStatus::Running;
        Some(record.task.clone())
    }

    /// Mark a task finished and store its score.
    ///
    /// Each emitted task accepts exactly one result; a repeated result would
    /// put a second task in flight.
    pub fn finish(&mut self, result: &TaskResult) -> Result<()> {
        let record = self
            .records
            .get_mut(&result.task_id)
            .ok_or_else(|| PodarError::UnknownTask {
                task_id: result.task_id.label(),
            })?;
        if record.status == TaskStatus::Finished {
            return Err(PodarError::TaskAlreadyFinished {
                task_id: result.task_id.label(),
            });
        }
        record.status = TaskStatus::Finished;
        if result.score.is_some() {
            record.score = result.score;
        }
        self.store.save_record(record)?;
        Ok(())
    }

    /// Replace the best result if `result` scores strictly higher.
    ///
    /// Returns whether the best result changed.
    pub fn update_best(&mut self, result: &TaskResult) -> Result<bool> {
        let Some(score) = result.score else {
            return Ok(false);
        };
        if self.best.as_ref().is_some_and(|best| score <= best.score) {
            return Ok(false);
        }
        let record = self
            .records
            .get(&result.task_id)
            .ok_or_else(|| PodarError::UnknownTask {
                task_id: result.task_id.label(),
            })?;
        let config_list = self.store.load_config_list(&record.task.config_list_ref)?;
        let (snapshot, config_list_ref) =
            self.store.save_best(&result.compact_model, &result.compact_masks, &config_list)?;

        info!(task_id = %result.task_id, score, "new best result");
        self.best = Some(BestResult {
            task_id: result.task_id,
            score,
            snapshot,
            config_list_ref,
        });
        Ok(true)
    }

    /// Score recorded for a task, if any.
    pub fn score_of(&self, task_id: TaskId) -> Option<f64> {
        self.records.get(&task_id).and_then(|r| r.score)
    }

    pub fn best(&self) -> Option<&BestResult> {
        self.best.as_ref()
    }

    /// Audit trail ordered by task id, origin first.
    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.values()
    }

    pub fn record(&self, task_id: TaskId) -> Option<&TaskRecord> {
        self.records.get(&task_id)
    }

    /// Number of queued tasks.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArtifactStore, InMemoryStore};

    fn layout() -> ModelLayout {
        ModelLayout::default()
            .with_op("fc1", "Linear", 100)
            .with_op("fc2", "Linear", 300)
    }

    fn core() -> GeneratorCore {
        GeneratorCore::new(
            layout(),
            MaskSet::new(),
            &[UserSparsityConfig::total_sparsity(0.5).with_op_types(["Linear"])],
            RunStore::new(InMemoryStore::new()),
        )
        .expect("core should build")
    }

    #[test]
    fn test_empty_masks_become_identity() {
        let core = core();
        assert_eq!(core.origin_masks(), &MaskSet::identity(&layout()));
        assert_eq!(core.target().len(), 1);
    }

    #[test]
    fn test_config_error_writes_nothing() {
        let backend = InMemoryStore::new();
        let err = GeneratorCore::new(
            layout(),
            MaskSet::new(),
            &[UserSparsityConfig::default().with_op_types(["Linear"])],
            RunStore::new(backend.clone()),
        )
        .unwrap_err();
        assert!(err.is_user_error());
        assert!(backend.list().expect("list").is_empty());
    }

    #[test]
    fn test_emit_allocates_monotonic_ids() {
        let mut core = core();
        let origin = core.register_origin().expect("origin");
        let base = Snapshot {
            model_ref: origin.model_ref,
            masks_ref: origin.masks_ref,
        };
        let list: ConfigList = vec![SparsityConfig::single("fc1", 0.1)].into_iter().collect();
        let first = core.emit(&base, &list).expect("emit");
        let second = core.emit(&base, &list).expect("emit");
        assert_eq!(first.task_id, TaskId::Index(0));
        assert_eq!(second.task_id, TaskId::Index(1));
        assert_eq!(second.config_list_ref.key(), "intermediate_result/1_config_list.json");
        assert!(core.store().backend().exists("intermediate_result/1_task.json").expect("exists"));
    }

    #[test]
    fn test_pending_queue_is_fifo_and_marks_running() {
        let mut core = core();
        let origin = core.register_origin().expect("origin");
        let base = Snapshot {
            model_ref: origin.model_ref,
            masks_ref: origin.masks_ref,
        };
        let list = ConfigList::new();
        let a = core.emit(&base, &list).expect("emit");
        let b = core.emit(&base, &list).expect("emit");
        core.enqueue(vec![a.clone(), b.clone()]);

        assert_eq!(core.pop_pending().map(|t| t.task_id), Some(a.task_id));
        assert_eq!(core.record(a.task_id).map(|r| r.status), Some(TaskStatus::Running));
        assert_eq!(core.pending_len(), 1);
        assert_eq!(core.pop_pending().map(|t| t.task_id), Some(b.task_id));
        assert!(core.pop_pending().is_none());
    }

    #[test]
    fn test_observe_unknown_task() {
        let mut core = core();
        let result = TaskResult::new(42, layout(), MaskSet::new());
        assert!(matches!(core.observe(&result), Err(PodarError::UnknownTask { .. })));
        assert!(matches!(core.finish(&result), Err(PodarError::UnknownTask { .. })));
    }

    #[test]
    fn test_best_keeps_earlier_on_tie() {
        let mut core = core();
        let origin = core.register_origin().expect("origin");
        let base = Snapshot {
            model_ref: origin.model_ref,
            masks_ref: origin.masks_ref,
        };
        let list = ConfigList::new();
        let a = core.emit(&base, &list).expect("emit");
        let b = core.emit(&base, &list).expect("emit");

        let ra = TaskResult::new(a.task_id, layout(), MaskSet::new()).with_score(0.8);
        let rb = TaskResult::new(b.task_id, layout(), MaskSet::new()).with_score(0.8);
        assert!(core.update_best(&ra).expect("best"));
        assert!(!core.update_best(&rb).expect("best"));
        assert_eq!(core.best().map(|b| b.task_id), Some(a.task_id));
        assert!(core
            .store()
            .backend()
            .exists("best_result/config_list.json")
            .expect("exists"));
    }

    #[test]
    fn test_finish_accepts_one_result_per_task() {
        let mut core = core();
        let origin = core.register_origin().expect("origin");
        let base = Snapshot {
            model_ref: origin.model_ref,
            masks_ref: origin.masks_ref,
        };
        let list: ConfigList = vec![SparsityConfig::single("fc1", 0.1)].into_iter().collect();
        let task = core.emit(&base, &list).expect("emit");

        let result = TaskResult::new(task.task_id, layout(), MaskSet::new()).with_score(0.4);
        core.finish(&result).expect("first result");
        let err = core.finish(&result.with_score(0.8)).unwrap_err();
        assert!(matches!(err, PodarError::TaskAlreadyFinished { .. }));
        assert_eq!(core.score_of(task.task_id), Some(0.4));

        let err = core.finish(&TaskResult::origin(layout(), MaskSet::new())).unwrap_err();
        assert!(matches!(err, PodarError::TaskAlreadyFinished { .. }));
    }

    #[test]
    fn test_origin_snapshot_written_once() {
        let backend = InMemoryStore::new();
        let mut core = GeneratorCore::new(
            layout(),
            MaskSet::new(),
            &[UserSparsityConfig::total_sparsity(0.5).with_op_types(["Linear"])],
            RunStore::new(backend.clone()),
        )
        .expect("core should build");
        let origin = core.register_origin().expect("origin");
        backend.delete(origin.masks_ref.key()).expect("delete");

        let origin_result = core.origin_result();
        let (snapshot, _) = core.observe(&origin_result).expect("observe");
        assert_eq!(snapshot.masks_ref, origin.masks_ref);
        assert!(!backend.exists(origin.masks_ref.key()).expect("exists"));
    }
}
