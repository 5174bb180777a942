//! Read-only views over a task list: what to work on next, how the work
//! streams stand, and which tasks match a filter or a search.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::graph::DependencyGraph;
use super::id::{PositionId, StableId};
use super::list::TaskList;
use super::task::{Task, TaskStatus};

/// Criteria a task must meet; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Effective stream, so `1` also matches unassigned tasks
    pub stream: Option<u32>,
    /// `Some("")` matches unowned tasks only
    pub owner: Option<String>,
    /// Deepest level to include; root tasks are level 1
    pub max_depth: Option<usize>,
    /// Only direct children of this task
    pub parent: Option<PositionId>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        *self == TaskFilter::default()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.stream.is_some_and(|stream| task.effective_stream() != stream) {
            return false;
        }
        if let Some(owner) = &self.owner {
            if task.owner.as_deref().unwrap_or("") != owner.as_str() {
                return false;
            }
        }
        if self.max_depth.is_some_and(|max| task.id.depth() > max) {
            return false;
        }
        if let Some(parent) = &self.parent {
            if task.id.parent().as_ref() != Some(parent) {
                return false;
            }
        }
        true
    }
}

/// Every task matching `filter`, in document order
pub fn filter_tasks<'a>(list: &'a TaskList, filter: &TaskFilter) -> Vec<&'a Task> {
    list.iter().filter(|task| filter.matches(task)).collect()
}

/// Where `find` looks for its pattern
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub details: bool,
    pub references: bool,
}

/// Tasks whose title (and optionally details or references) contain
/// `pattern`, narrowed by `filter`
pub fn find_tasks<'a>(
    list: &'a TaskList,
    pattern: &str,
    options: SearchOptions,
    filter: &TaskFilter,
) -> Vec<&'a Task> {
    let fold = |text: &str| {
        if options.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    };
    let needle = fold(pattern);
    let hit = |text: &String| fold(text).contains(&needle);

    list.iter()
        .filter(|task| {
            hit(&task.title)
                || (options.details && task.details.iter().any(hit))
                || (options.references && task.references.iter().any(hit))
        })
        .filter(|task| filter.matches(task))
        .collect()
}

/// The first task with outstanding work, plus its outstanding children
#[derive(Debug, Serialize)]
pub struct NextTask<'a> {
    pub task: &'a Task,
    pub incomplete_children: Vec<&'a Task>,
}

impl<'a> NextTask<'a> {
    pub fn of(task: &'a Task) -> Self {
        Self {
            task,
            incomplete_children: task
                .children
                .iter()
                .filter(|c| has_incomplete_work(c))
                .collect(),
        }
    }
}

/// A task without its subtree, for compact listings
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary<'a> {
    pub id: &'a PositionId,
    pub title: &'a str,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<&'a str>,
}

impl<'a> From<&'a Task> for TaskSummary<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            title: &task.title,
            status: task.status,
            owner: task.owner.as_deref(),
        }
    }
}

/// Finds the first task, depth-first, that is itself incomplete or has an
/// incomplete descendant
pub fn next_task(list: &TaskList) -> Option<NextTask<'_>> {
    list.tasks.iter().find_map(next_in)
}

fn next_in(task: &Task) -> Option<NextTask<'_>> {
    if has_incomplete_work(task) {
        return Some(NextTask::of(task));
    }
    task.children.iter().find_map(next_in)
}

/// The chain from the next task down to its first incomplete leaf
///
/// Each step is the first child with outstanding work, so the last entry is
/// the most specific thing to do.
pub fn first_incomplete_path(list: &TaskList) -> Vec<&Task> {
    let mut path = Vec::new();
    let mut current = next_task(list).map(|next| next.task);
    while let Some(task) = current {
        path.push(task);
        current = task.children.iter().find(|c| has_incomplete_work(c));
    }
    path
}

fn has_incomplete_work(task: &Task) -> bool {
    !task.status.is_complete() || task.children.iter().any(has_incomplete_work)
}

/// Classification of one work stream
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStatus {
    pub id: u32,
    pub ready: Vec<String>,
    pub blocked: Vec<String>,
    pub active: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamsReport {
    pub streams: Vec<StreamStatus>,
    /// Streams with at least one ready task
    pub available: Vec<u32>,
}

/// Dependency state of a document, built once per query
struct Readiness {
    graph: DependencyGraph,
    statuses: HashMap<StableId, TaskStatus>,
}

impl Readiness {
    fn new(list: &TaskList) -> Self {
        Self {
            graph: DependencyGraph::from_list(list),
            statuses: list
                .iter()
                .filter_map(|t| t.stable_id.clone().map(|id| (id, t.status)))
                .collect(),
        }
    }

    fn is_blocked(&self, task: &Task) -> bool {
        match &task.stable_id {
            Some(id) => self.graph.is_blocked(id, &self.statuses),
            // hand-edited files can carry blockers on a task without an ID
            None => task
                .blocked_by
                .iter()
                .any(|b| self.statuses.get(b).is_some_and(|s| !s.is_complete())),
        }
    }

    /// Pending, unowned and not waiting on anything
    fn is_ready(&self, task: &Task) -> bool {
        task.status == TaskStatus::Pending && task.owner.is_none() && !self.is_blocked(task)
    }
}

/// Tasks that can be picked up now, in document order
///
/// With `stream` set only that stream's tasks are returned.
pub fn ready_tasks(list: &TaskList, stream: Option<u32>) -> Vec<&Task> {
    let readiness = Readiness::new(list);
    list.iter()
        .filter(|task| stream.map_or(true, |s| task.effective_stream() == s))
        .filter(|task| readiness.is_ready(task))
        .collect()
}

/// Groups tasks by stream and classifies them
///
/// Ready: pending, every blocker completed, unowned. Blocked: pending with an
/// incomplete blocker. Active: in progress. Completed tasks and owned pending
/// tasks appear in no list.
pub fn analyze_streams(list: &TaskList) -> StreamsReport {
    let readiness = Readiness::new(list);

    let mut streams: BTreeMap<u32, StreamStatus> = BTreeMap::new();
    for task in list.iter() {
        let id = task.effective_stream();
        let stream = streams.entry(id).or_insert_with(|| StreamStatus {
            id,
            ..StreamStatus::default()
        });

        let position = task.id.to_string();
        match task.status {
            TaskStatus::InProgress => stream.active.push(position),
            TaskStatus::Completed => {}
            TaskStatus::Pending => {
                if readiness.is_blocked(task) {
                    stream.blocked.push(position);
                } else if task.owner.is_none() {
                    stream.ready.push(position);
                }
            }
        }
    }

    let available = streams
        .values()
        .filter(|s| !s.ready.is_empty())
        .map(|s| s.id)
        .collect();

    StreamsReport {
        streams: streams.into_values().collect(),
        available,
    }
}
