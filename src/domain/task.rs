//! Task domain model
//!
//! A task is one checklist entry. It owns its subtasks, so a task list is a
//! forest of these values rooted in [`TaskList`](super::list::TaskList).

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::id::{PositionId, StableId};

/// Status of a task
///
/// Serialized as `pending`, `in_progress` or `completed`. Deserialization
/// also accepts the integers `0`, `1` and `2`, and a few spelling variants,
/// since batch requests are often written by hand or by other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// The markdown checkbox for this status
    pub fn checkbox(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "[ ]",
            TaskStatus::InProgress => "[-]",
            TaskStatus::Completed => "[x]",
        }
    }

    /// Parses the character between checkbox brackets
    pub fn from_checkbox_mark(mark: char) -> Option<Self> {
        match mark {
            ' ' => Some(TaskStatus::Pending),
            '-' => Some(TaskStatus::InProgress),
            'x' | 'X' => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pending" | "todo" => Some(TaskStatus::Pending),
            "in_progress" | "in-progress" | "inprogress" => Some(TaskStatus::InProgress),
            "completed" | "complete" | "done" => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(TaskStatus::Pending),
            1 => Some(TaskStatus::InProgress),
            2 => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::from_name(s).ok_or_else(|| format!("invalid status '{}'", s))
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{Error, Visitor};

        struct StatusVisitor;

        impl<'v> Visitor<'v> for StatusVisitor {
            type Value = TaskStatus;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a status name or a status code between 0 and 2")
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
                TaskStatus::from_code(v)
                    .ok_or_else(|| E::custom(format!("invalid status code {}", v)))
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .ok()
                    .and_then(TaskStatus::from_code)
                    .ok_or_else(|| E::custom(format!("invalid status code {}", v)))
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                TaskStatus::from_name(v).ok_or_else(|| E::custom(format!("invalid status '{}'", v)))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// A task within a task list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Current position in the tree; rewritten on every renumber
    pub id: PositionId,

    /// Persistent identity, assigned the first time a dependency needs it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<StableId>,

    pub title: String,

    pub status: TaskStatus,

    /// Free-form detail lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,

    /// File paths or URLs relevant to the task
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Requirement numbers in the document's requirements file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<PositionId>,

    /// Stable IDs of tasks that must complete before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<StableId>,

    /// Work stream; `None` reads as stream 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<u32>,

    /// Agent or person that claimed the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Task>,
}

impl Task {
    /// Creates a pending task with no metadata
    pub fn new(id: PositionId, title: impl Into<String>) -> Self {
        Self {
            id,
            stable_id: None,
            title: title.into(),
            status: TaskStatus::Pending,
            details: Vec::new(),
            references: Vec::new(),
            requirements: Vec::new(),
            blocked_by: Vec::new(),
            stream: None,
            owner: None,
            children: Vec::new(),
        }
    }

    /// The stream this task belongs to, treating unassigned as stream 1
    pub fn effective_stream(&self) -> u32 {
        self.stream.unwrap_or(1)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// True when the task has children and every one of them is completed
    pub fn children_complete(&self) -> bool {
        self.has_children() && self.children.iter().all(|c| c.status.is_complete())
    }

    /// Adds a blocker unless it is already present
    pub fn add_blocker(&mut self, id: StableId) -> bool {
        if self.blocked_by.contains(&id) {
            return false;
        }
        self.blocked_by.push(id);
        true
    }

    /// Keeps only the blockers `keep` accepts; returns how many were dropped
    pub fn retain_blockers(&mut self, mut keep: impl FnMut(&StableId) -> bool) -> usize {
        let before = self.blocked_by.len();
        self.blocked_by.retain(|id| keep(id));
        before - self.blocked_by.len()
    }

    /// Calls `f` on this task and every descendant, parents first
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Task)) {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(title: &str) -> Task {
        Task::new(PositionId::root(1), title)
    }

    #[test]
    fn status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );

        let parsed: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, TaskStatus::Completed);

        let parsed: TaskStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(parsed, TaskStatus::InProgress);
    }

    #[test]
    fn status_accepts_numeric_codes() {
        let parsed: TaskStatus = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, TaskStatus::Pending);
        let parsed: TaskStatus = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, TaskStatus::Completed);

        assert!(serde_json::from_str::<TaskStatus>("3").is_err());
        assert!(serde_json::from_str::<TaskStatus>("-1").is_err());
        assert!(serde_json::from_str::<TaskStatus>("\"finished\"").is_err());

        assert_eq!("done".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert!("finished".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn checkbox_marks() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            let mark = status.checkbox().chars().nth(1).unwrap();
            assert_eq!(TaskStatus::from_checkbox_mark(mark), Some(status));
        }
        assert_eq!(
            TaskStatus::from_checkbox_mark('X'),
            Some(TaskStatus::Completed)
        );
        assert_eq!(TaskStatus::from_checkbox_mark('?'), None);
    }

    #[test]
    fn children_complete_requires_children() {
        let mut task = make_task("Parent");
        assert!(!task.children_complete());

        task.children.push(Task::new(PositionId::root(1).child(1), "A"));
        task.children.push(Task::new(PositionId::root(1).child(2), "B"));
        assert!(!task.children_complete());

        for child in &mut task.children {
            child.status = TaskStatus::Completed;
        }
        assert!(task.children_complete());
    }

    #[test]
    fn blockers_are_deduplicated() {
        let mut task = make_task("Blocked");
        let id: StableId = "0000001".parse().unwrap();

        assert!(task.add_blocker(id.clone()));
        assert!(!task.add_blocker(id.clone()));
        assert_eq!(task.blocked_by.len(), 1);

        assert_eq!(task.retain_blockers(|b| b != &id), 1);
        assert!(task.blocked_by.is_empty());
    }

    #[test]
    fn effective_stream_defaults_to_one() {
        let mut task = make_task("Streamed");
        assert_eq!(task.effective_stream(), 1);
        task.stream = Some(3);
        assert_eq!(task.effective_stream(), 3);
    }
}
