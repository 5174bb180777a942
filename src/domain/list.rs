//! Task list (document) model
//!
//! A [`TaskList`] is an ordered forest of [`Task`]s plus a document title and
//! front matter. Position IDs are always derived from where a task sits; every
//! structural change ends with [`TaskList::renumber`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use super::id::{IdError, PositionId, StableId, StableIdGenerator};
use super::task::{Task, TaskStatus};

/// Requirements file linked from tasks when the document names none
pub const DEFAULT_REQUIREMENTS_FILE: &str = "requirements.md";

/// Document-level metadata stored ahead of the task tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Arbitrary YAML kept as written
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_yaml::Value>,

    /// Highest stable ID ever issued in this document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<StableId>,
}

impl FrontMatter {
    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.metadata.is_empty() && self.last_id.is_none()
    }
}

/// Counts of tasks per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

/// A hierarchical task document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub title: String,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default, skip_serializing_if = "FrontMatter::is_empty")]
    pub front_matter: FrontMatter,

    /// Target of requirement links, read back from the first link in the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_file: Option<String>,

    pub modified: DateTime<Utc>,
}

impl TaskList {
    /// Creates an empty document
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tasks: Vec::new(),
            front_matter: FrontMatter::default(),
            requirements_file: None,
            modified: Utc::now(),
        }
    }

    /// The file requirement links point at
    pub fn requirements_file(&self) -> &str {
        self.requirements_file
            .as_deref()
            .unwrap_or(DEFAULT_REQUIREMENTS_FILE)
    }

    /// Marks the document as modified now
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    /// Iterates over every task, depth-first in document order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: vec![self.tasks.iter()],
        }
    }

    /// Total number of tasks at every level
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn find(&self, id: &PositionId) -> Option<&Task> {
        let (first, rest) = id.segments().split_first()?;
        let mut task = self.tasks.get(slot_index(*first)?)?;
        for segment in rest {
            task = task.children.get(slot_index(*segment)?)?;
        }
        Some(task)
    }

    pub fn find_mut(&mut self, id: &PositionId) -> Option<&mut Task> {
        let (first, rest) = id.segments().split_first()?;
        let mut task = self.tasks.get_mut(slot_index(*first)?)?;
        for segment in rest {
            task = task.children.get_mut(slot_index(*segment)?)?;
        }
        Some(task)
    }

    /// Finds the task carrying a stable ID
    pub fn find_by_stable_id(&self, id: &StableId) -> Option<&Task> {
        self.iter().find(|t| t.stable_id.as_ref() == Some(id))
    }

    /// Resolves a user-supplied reference to a current position
    ///
    /// A string naming an existing position wins; otherwise a stable ID
    /// naming an existing task; otherwise nothing.
    pub fn resolve(&self, reference: &str) -> Option<PositionId> {
        let reference = reference.trim();

        if let Ok(position) = reference.parse::<PositionId>() {
            if self.find(&position).is_some() {
                return Some(position);
            }
        }

        let stable: StableId = reference.parse().ok()?;
        self.find_by_stable_id(&stable).map(|t| t.id.clone())
    }

    /// Every stable ID currently assigned
    pub fn stable_ids(&self) -> impl Iterator<Item = &StableId> {
        self.iter().filter_map(|t| t.stable_id.as_ref())
    }

    /// Issues a fresh stable ID and advances the high-water mark
    pub fn next_stable_id(&mut self) -> Result<StableId, IdError> {
        let mut generator =
            StableIdGenerator::new(self.stable_ids().chain(self.front_matter.last_id.as_ref()));
        let id = generator.generate()?;
        self.front_matter.last_id = generator.high_water();
        Ok(id)
    }

    /// Returns the task's stable ID, assigning one if it has none
    pub fn ensure_stable_id(&mut self, position: &PositionId) -> Result<Option<StableId>, IdError> {
        match self.find(position) {
            None => return Ok(None),
            Some(task) => {
                if let Some(id) = &task.stable_id {
                    return Ok(Some(id.clone()));
                }
            }
        }

        let id = self.next_stable_id()?;
        if let Some(task) = self.find_mut(position) {
            task.stable_id = Some(id.clone());
        }
        Ok(Some(id))
    }

    /// Sibling group under `parent`, or the root list
    pub fn siblings_mut(&mut self, parent: Option<&PositionId>) -> Option<&mut Vec<Task>> {
        match parent {
            None => Some(&mut self.tasks),
            Some(p) => self.find_mut(p).map(|t| &mut t.children),
        }
    }

    /// Inserts a task among `parent`'s children
    ///
    /// `slot` is 1-based; `None` or a slot past the end appends. Returns the
    /// position the task ended up at, or `None` if the parent does not exist.
    pub fn insert(
        &mut self,
        parent: Option<&PositionId>,
        slot: Option<u32>,
        task: Task,
    ) -> Option<PositionId> {
        let siblings = self.siblings_mut(parent)?;
        let index = slot
            .and_then(slot_index)
            .map_or(siblings.len(), |i| i.min(siblings.len()));
        siblings.insert(index, task);
        self.renumber();

        let slot = u32::try_from(index + 1).ok()?;
        Some(match parent {
            Some(p) => p.child(slot),
            None => PositionId::root(slot),
        })
    }

    /// Removes a task with its subtree
    ///
    /// Stable IDs that leave the document are stripped from every surviving
    /// task's `blocked_by` list.
    pub fn remove(&mut self, id: &PositionId) -> Option<Task> {
        let index = slot_index(id.slot())?;
        let parent = id.parent();
        let siblings = self.siblings_mut(parent.as_ref())?;
        if index >= siblings.len() {
            return None;
        }
        let removed = siblings.remove(index);
        self.renumber();

        let mut gone = HashSet::new();
        collect_stable_ids(&removed, &mut gone);
        if !gone.is_empty() {
            let mut dropped = 0;
            for task in &mut self.tasks {
                task.for_each_mut(&mut |t| {
                    dropped += t.retain_blockers(|b| !gone.contains(b));
                });
            }
            if dropped > 0 {
                warn!(
                    task = %id,
                    edges = dropped,
                    "Removed task was blocking others; dependency edges dropped"
                );
            }
        }

        Some(removed)
    }

    /// Recomputes every position ID from tree order
    pub fn renumber(&mut self) {
        renumber_group(&mut self.tasks, None);
    }

    /// Counts tasks per status
    pub fn stats(&self) -> Stats {
        self.iter().fold(Stats::default(), |mut stats, task| {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            stats
        })
    }
}

/// Depth-first iterator over a task forest
pub struct Iter<'a> {
    stack: Vec<std::slice::Iter<'a, Task>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(top) = self.stack.last_mut() {
            match top.next() {
                Some(task) => {
                    self.stack.push(task.children.iter());
                    return Some(task);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

fn slot_index(slot: u32) -> Option<usize> {
    (slot as usize).checked_sub(1)
}

fn renumber_group(tasks: &mut [Task], parent: Option<&PositionId>) {
    for (i, task) in tasks.iter_mut().enumerate() {
        let slot = i as u32 + 1;
        task.id = match parent {
            Some(p) => p.child(slot),
            None => PositionId::root(slot),
        };
        let id = task.id.clone();
        renumber_group(&mut task.children, Some(&id));
    }
}

fn collect_stable_ids(task: &Task, out: &mut HashSet<StableId>) {
    if let Some(id) = &task.stable_id {
        out.insert(id.clone());
    }
    for child in &task.children {
        collect_stable_ids(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(s: &str) -> PositionId {
        s.parse().unwrap()
    }

    fn sid(s: &str) -> StableId {
        s.parse().unwrap()
    }

    fn sample_list() -> TaskList {
        let mut list = TaskList::new("Plan");
        for title in ["One", "Two", "Three"] {
            list.insert(None, None, Task::new(PositionId::root(1), title))
                .unwrap();
        }
        list.insert(Some(&pos("2")), None, Task::new(PositionId::root(1), "Two A"))
            .unwrap();
        list.insert(Some(&pos("2")), None, Task::new(PositionId::root(1), "Two B"))
            .unwrap();
        list
    }

    fn titles(list: &TaskList) -> Vec<(String, String)> {
        list.iter()
            .map(|t| (t.id.to_string(), t.title.clone()))
            .collect()
    }

    #[test]
    fn insert_appends_and_numbers() {
        let list = sample_list();
        assert_eq!(
            titles(&list),
            vec![
                ("1".to_string(), "One".to_string()),
                ("2".to_string(), "Two".to_string()),
                ("2.1".to_string(), "Two A".to_string()),
                ("2.2".to_string(), "Two B".to_string()),
                ("3".to_string(), "Three".to_string()),
            ]
        );
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn insert_at_slot_shifts_siblings() {
        let mut list = sample_list();
        let at = list
            .insert(None, Some(2), Task::new(PositionId::root(1), "Inserted"))
            .unwrap();
        assert_eq!(at, pos("2"));
        assert_eq!(list.find(&pos("3")).unwrap().title, "Two");
        assert_eq!(list.find(&pos("3.1")).unwrap().title, "Two A");
    }

    #[test]
    fn insert_past_end_appends() {
        let mut list = sample_list();
        let at = list
            .insert(Some(&pos("2")), Some(99), Task::new(PositionId::root(1), "Last"))
            .unwrap();
        assert_eq!(at, pos("2.3"));
    }

    #[test]
    fn insert_under_missing_parent_fails() {
        let mut list = sample_list();
        assert!(list
            .insert(Some(&pos("9")), None, Task::new(PositionId::root(1), "Orphan"))
            .is_none());
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn remove_middle_renumbers_and_keeps_stable_ids() {
        let mut list = TaskList::new("Plan");
        for title in ["A", "B", "C"] {
            list.insert(None, None, Task::new(PositionId::root(1), title));
        }
        let a = list.ensure_stable_id(&pos("1")).unwrap().unwrap();
        let c = list.ensure_stable_id(&pos("3")).unwrap().unwrap();

        let removed = list.remove(&pos("2")).unwrap();
        assert_eq!(removed.title, "B");

        assert_eq!(list.find(&pos("1")).unwrap().stable_id, Some(a));
        let second = list.find(&pos("2")).unwrap();
        assert_eq!(second.title, "C");
        assert_eq!(second.stable_id, Some(c));
        assert!(list.find(&pos("3")).is_none());
    }

    #[test]
    fn remove_strips_dangling_blockers() {
        let mut list = sample_list();
        let blocker = list.ensure_stable_id(&pos("2.1")).unwrap().unwrap();
        list.find_mut(&pos("3")).unwrap().add_blocker(blocker.clone());

        list.remove(&pos("2")).unwrap();

        let survivor = list.find(&pos("2")).unwrap();
        assert_eq!(survivor.title, "Three");
        assert!(survivor.blocked_by.is_empty());
        assert!(list.find_by_stable_id(&blocker).is_none());
    }

    #[test]
    fn resolve_prefers_positions() {
        let mut list = sample_list();
        let id = list.ensure_stable_id(&pos("3")).unwrap().unwrap();

        assert_eq!(list.resolve("2.1"), Some(pos("2.1")));
        assert_eq!(list.resolve(id.as_str()), Some(pos("3")));
        assert_eq!(list.resolve(" 1 "), Some(pos("1")));
        assert_eq!(list.resolve("7"), None);
        assert_eq!(list.resolve("zzzzzzz"), None);
        assert_eq!(list.resolve("bogus"), None);
    }

    #[test]
    fn stable_ids_are_never_reused_after_removal() {
        let mut list = sample_list();
        let first = list.ensure_stable_id(&pos("1")).unwrap().unwrap();
        let second = list.ensure_stable_id(&pos("3")).unwrap().unwrap();
        assert_eq!(first, sid("0000001"));
        assert_eq!(second, sid("0000002"));

        list.remove(&pos("3")).unwrap();
        let third = list.ensure_stable_id(&pos("2")).unwrap().unwrap();
        assert_eq!(third, sid("0000003"));
        assert_eq!(list.front_matter.last_id, Some(third));
    }

    #[test]
    fn ensure_stable_id_is_idempotent() {
        let mut list = sample_list();
        let a = list.ensure_stable_id(&pos("1")).unwrap();
        let b = list.ensure_stable_id(&pos("1")).unwrap();
        assert_eq!(a, b);
        assert_eq!(list.ensure_stable_id(&pos("8")).unwrap(), None);
    }

    #[test]
    fn stats_count_every_level() {
        let mut list = sample_list();
        list.find_mut(&pos("2.1")).unwrap().status = TaskStatus::Completed;
        list.find_mut(&pos("3")).unwrap().status = TaskStatus::InProgress;

        let stats = list.stats();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.pending, 3);
    }
}
