//! Input rules for task payloads. Accepted strings come back trimmed.

use super::error::{TrackerError, TrackerResult};
use super::subtask_diff::DesiredSubtask;

pub const MIN_DESCRIPTION_CHARS: usize = 5;

/// Fields shared by task creation and task edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub time_estimate: i64,
}

impl TaskFields {
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] naming the first bad field.
    pub fn validated(self) -> TrackerResult<Self> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(invalid("title must not be empty"));
        }
        let description = self.description.trim();
        if description.chars().count() < MIN_DESCRIPTION_CHARS {
            return Err(invalid(format!(
                "description must be at least {MIN_DESCRIPTION_CHARS} characters"
            )));
        }
        if self.time_estimate < 1 {
            return Err(invalid("timeEstimate must be a positive number of minutes"));
        }
        Ok(Self {
            title: title.to_owned(),
            description: description.to_owned(),
            time_estimate: self.time_estimate,
        })
    }
}

/// # Errors
///
/// Returns [`TrackerError::Validation`] for an empty list or a blank title.
pub fn subtask_titles(titles: Vec<String>) -> TrackerResult<Vec<String>> {
    require_any(titles.len())?;
    titles.into_iter().map(|t| subtask_title(&t)).collect()
}

/// # Errors
///
/// Returns [`TrackerError::Validation`] for an empty list or a blank title.
pub fn desired_subtasks(desired: Vec<DesiredSubtask>) -> TrackerResult<Vec<DesiredSubtask>> {
    require_any(desired.len())?;
    desired
        .into_iter()
        .map(|d| {
            Ok(DesiredSubtask {
                title: subtask_title(&d.title)?,
                ..d
            })
        })
        .collect()
}

fn require_any(len: usize) -> TrackerResult<()> {
    if len == 0 {
        return Err(invalid("a task needs at least one subtask"));
    }
    Ok(())
}

fn subtask_title(raw: &str) -> TrackerResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(invalid("subtask title must not be empty"));
    }
    Ok(title.to_owned())
}

fn invalid(message: impl Into<String>) -> TrackerError {
    TrackerError::Validation(message.into())
}
