//! Membership diff between a task's stored subtasks and an edited list.

use std::collections::HashSet;

use super::domain::{Subtask, SubtaskId, TaskId};

/// One entry of an edited subtask list. Entries without an id, or whose id
/// is not stored on the task, are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredSubtask {
    pub id: Option<SubtaskId>,
    pub title: String,
    pub completed: bool,
}

impl DesiredSubtask {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            completed: false,
        }
    }

    #[must_use]
    pub fn existing(id: SubtaskId, title: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            title: title.into(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskDiff {
    pub to_delete: Vec<SubtaskId>,
    /// Stored ids that survive, in stored order.
    pub to_keep: Vec<SubtaskId>,
    pub to_create: Vec<DesiredSubtask>,
}

impl SubtaskDiff {
    #[must_use]
    pub fn plan(stored: &[Subtask], desired: &[DesiredSubtask]) -> Self {
        let stored_ids: HashSet<SubtaskId> = stored.iter().map(|s| s.id).collect();
        let desired_ids: HashSet<SubtaskId> = desired.iter().filter_map(|d| d.id).collect();

        let (to_keep, to_delete): (Vec<SubtaskId>, Vec<SubtaskId>) = stored
            .iter()
            .map(|s| s.id)
            .partition(|id| desired_ids.contains(id));

        let to_create = desired
            .iter()
            .filter(|d| d.id.map_or(true, |id| !stored_ids.contains(&id)))
            .cloned()
            .collect();

        Self {
            to_delete,
            to_keep,
            to_create,
        }
    }

    /// Turns the entries to create into fresh subtask records of `task_id`.
    #[must_use]
    pub fn new_subtasks(&self, task_id: TaskId) -> Vec<Subtask> {
        self.to_create
            .iter()
            .map(|d| Subtask {
                completed: d.completed,
                ..Subtask::new(task_id, d.title.clone())
            })
            .collect()
    }

    #[must_use]
    pub fn is_membership_unchanged(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

/// Changes an edit applies to a task's subtask list, with new records
/// already materialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskChanges {
    pub delete: Vec<SubtaskId>,
    pub keep: Vec<SubtaskId>,
    pub create: Vec<Subtask>,
}

impl SubtaskChanges {
    /// Diffs `desired` against `stored` and materialises the new records.
    #[must_use]
    pub fn plan(stored: &[Subtask], desired: &[DesiredSubtask], task_id: TaskId) -> Self {
        Self::from_diff(&SubtaskDiff::plan(stored, desired), task_id)
    }

    #[must_use]
    pub fn from_diff(diff: &SubtaskDiff, task_id: TaskId) -> Self {
        Self {
            delete: diff.to_delete.clone(),
            keep: diff.to_keep.clone(),
            create: diff.new_subtasks(task_id),
        }
    }

    /// Final reference list: kept ids followed by the created ones.
    #[must_use]
    pub fn final_order(&self) -> Vec<SubtaskId> {
        self.keep
            .iter()
            .copied()
            .chain(self.create.iter().map(|s| s.id))
            .collect()
    }
}
