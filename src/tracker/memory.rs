//! In-memory task store.
//!
//! Tasks and subtasks are kept as separate documents linked by id, the way
//! the relational store links rows. Each operation runs against a private
//! copy of the state which replaces the shared state only if every write
//! step succeeded, so an injected fault leaves nothing behind.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::completion;
use super::domain::{Subtask, SubtaskId, Task, TaskId, UserId};
use super::store::{StoreError, StoreResult, TaskEdit, TaskStore};
use super::subtask_diff::SubtaskChanges;
use super::timer::TimerState;

/// Individual writes inside a store operation, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStep {
    InsertTask,
    InsertSubtasks,
    DeleteSubtasks,
    SaveSubtask,
    SaveTask,
    DeleteTask,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<MemoryState>>,
    faults: Arc<Mutex<HashSet<WriteStep>>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_seq: u64,
    tasks: HashMap<TaskId, TaskDocument>,
    subtasks: HashMap<SubtaskId, Subtask>,
}

#[derive(Debug, Clone)]
struct TaskDocument {
    seq: u64,
    owner: UserId,
    title: String,
    description: String,
    time_estimate: i64,
    completed: bool,
    timer: TimerState,
    subtask_ids: Vec<SubtaskId>,
}

impl MemoryState {
    /// Subtasks pointing back at `task_id`, in the task's list order.
    fn subtasks_of(&self, task_id: TaskId) -> Vec<Subtask> {
        let order = self
            .tasks
            .get(&task_id)
            .map(|doc| doc.subtask_ids.as_slice())
            .unwrap_or_default();
        let mut subtasks: Vec<Subtask> = self
            .subtasks
            .values()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect();
        subtasks.sort_by_key(|s| order.iter().position(|id| *id == s.id).unwrap_or(usize::MAX));
        subtasks
    }

    fn populate(&self, id: TaskId) -> Option<Task> {
        let doc = self.tasks.get(&id)?;
        let subtasks = doc
            .subtask_ids
            .iter()
            .filter_map(|sid| self.subtasks.get(sid).cloned())
            .collect();
        Some(Task {
            id,
            owner: doc.owner,
            title: doc.title.clone(),
            description: doc.description.clone(),
            time_estimate: doc.time_estimate,
            completed: doc.completed,
            timer: doc.timer,
            subtasks,
        })
    }

    fn document_mut(&mut self, id: TaskId) -> StoreResult<&mut TaskDocument> {
        self.tasks.get_mut(&id).ok_or(StoreError::TaskNotFound(id))
    }

    /// Reloads the task's subtasks and writes the derived completion.
    fn recompute(&mut self, id: TaskId, now: DateTime<Utc>) -> StoreResult<()> {
        let subtasks = self.subtasks_of(id);
        let doc = self.document_mut(id)?;
        let reconciled = completion::reconcile(&subtasks, doc.timer, now);
        doc.completed = reconciled.completed;
        doc.timer = reconciled.timer;
        Ok(())
    }
}

struct Txn<'a> {
    working: MemoryState,
    faults: &'a Mutex<HashSet<WriteStep>>,
}

impl Txn<'_> {
    /// Fails the transaction if a fault is armed for `step`.
    fn write(&self, step: WriteStep) -> StoreResult<()> {
        let mut faults = self.faults.lock().map_err(lock_error)?;
        if faults.remove(&step) {
            return Err(StoreError::persistence(std::io::Error::other(format!(
                "injected failure at {step:?}"
            ))));
        }
        Ok(())
    }
}

fn lock_error(err: impl ToString) -> StoreError {
    StoreError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next write of `step` fail, aborting its operation.
    pub fn fail_next(&self, step: WriteStep) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(step);
        }
    }

    /// Number of stored subtask documents, linked or not.
    #[must_use]
    pub fn subtask_count(&self) -> usize {
        self.state.read().map_or(0, |state| state.subtasks.len())
    }

    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> StoreResult<T> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(f(&state))
    }

    fn transact<T>(&self, f: impl FnOnce(&mut Txn<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let mut state = self.state.write().map_err(lock_error)?;
        let mut txn = Txn {
            working: state.clone(),
            faults: &self.faults,
        };
        let out = f(&mut txn)?;
        *state = txn.working;
        Ok(out)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.transact(|txn| {
            txn.write(WriteStep::InsertTask)?;
            let seq = txn.working.next_seq;
            txn.working.next_seq += 1;
            txn.working.tasks.insert(
                task.id,
                TaskDocument {
                    seq,
                    owner: task.owner,
                    title: task.title.clone(),
                    description: task.description.clone(),
                    time_estimate: task.time_estimate,
                    completed: task.completed,
                    timer: task.timer,
                    subtask_ids: Vec::new(),
                },
            );

            txn.write(WriteStep::InsertSubtasks)?;
            for subtask in &task.subtasks {
                txn.working.subtasks.insert(subtask.id, subtask.clone());
            }

            txn.write(WriteStep::SaveTask)?;
            txn.working.document_mut(task.id)?.subtask_ids =
                task.subtasks.iter().map(|s| s.id).collect();
            Ok(())
        })
    }

    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.read(|state| state.populate(id))
    }

    async fn find_subtask(&self, id: SubtaskId) -> StoreResult<Option<Subtask>> {
        self.read(|state| state.subtasks.get(&id).cloned())
    }

    async fn list_tasks(&self, owner: UserId) -> StoreResult<Vec<Task>> {
        self.read(|state| {
            let mut owned: Vec<(u64, TaskId)> = state
                .tasks
                .iter()
                .filter(|(_, doc)| doc.owner == owner)
                .map(|(id, doc)| (doc.seq, *id))
                .collect();
            owned.sort_unstable();
            owned
                .into_iter()
                .filter_map(|(_, id)| state.populate(id))
                .collect()
        })
    }

    async fn apply_edit(&self, edit: &TaskEdit) -> StoreResult<Task> {
        self.transact(|txn| {
            txn.working.document_mut(edit.task_id)?;
            let stored = txn.working.subtasks_of(edit.task_id);
            let changes = SubtaskChanges::plan(&stored, &edit.subtasks, edit.task_id);

            txn.write(WriteStep::DeleteSubtasks)?;
            for id in &changes.delete {
                txn.working.subtasks.remove(id);
            }

            txn.write(WriteStep::InsertSubtasks)?;
            for subtask in &changes.create {
                txn.working.subtasks.insert(subtask.id, subtask.clone());
            }

            txn.write(WriteStep::SaveTask)?;
            let doc = txn.working.document_mut(edit.task_id)?;
            doc.title.clone_from(&edit.title);
            doc.description.clone_from(&edit.description);
            doc.time_estimate = edit.time_estimate;
            doc.subtask_ids = changes.final_order();
            txn.working.recompute(edit.task_id, edit.now)?;

            txn.working
                .populate(edit.task_id)
                .ok_or(StoreError::TaskNotFound(edit.task_id))
        })
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<()> {
        self.transact(|txn| {
            let subtask_ids = txn.working.document_mut(id)?.subtask_ids.clone();

            txn.write(WriteStep::DeleteSubtasks)?;
            for sid in &subtask_ids {
                txn.working.subtasks.remove(sid);
            }
            txn.working.subtasks.retain(|_, s| s.task_id != id);

            txn.write(WriteStep::DeleteTask)?;
            txn.working.tasks.remove(&id);
            Ok(())
        })
    }

    async fn set_subtask_completion(
        &self,
        id: SubtaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Task> {
        self.transact(|txn| {
            txn.write(WriteStep::SaveSubtask)?;
            let subtask = txn
                .working
                .subtasks
                .get_mut(&id)
                .ok_or(StoreError::SubtaskNotFound(id))?;
            subtask.completed = completed;
            let task_id = subtask.task_id;

            txn.write(WriteStep::SaveTask)?;
            txn.working.recompute(task_id, now)?;
            txn.working
                .populate(task_id)
                .ok_or(StoreError::TaskNotFound(task_id))
        })
    }

    async fn save_timer(&self, id: TaskId, timer: TimerState) -> StoreResult<TimerState> {
        self.transact(|txn| {
            txn.write(WriteStep::SaveTask)?;
            txn.working.document_mut(id)?.timer = timer;
            Ok(timer)
        })
    }
}
