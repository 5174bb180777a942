//! Batch transaction engine
//!
//! A batch is an ordered list of [`Operation`]s applied all-or-nothing.
//! Every operation is first validated and applied against a simulation copy
//! of the document built through the [`DocumentCodec`]; the real document is
//! only touched once the whole batch has succeeded there.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

use super::autocomplete::propagate_completion;
use super::codec::{CodecError, DocumentCodec};
use super::graph::DependencyGraph;
use super::id::{IdError, PositionId, StableId};
use super::list::TaskList;
use super::task::{Task, TaskStatus};

pub const MAX_TITLE_LEN: usize = 500;
pub const MAX_DETAIL_LEN: usize = 1000;
pub const MAX_REFERENCE_LEN: usize = 500;

/// Detail prefixes the document format reads back as task metadata
const RESERVED_DETAIL_PREFIXES: [&str; 5] = [
    "blocked-by:",
    "stream:",
    "owner:",
    "references:",
    "requirements:",
];

/// A checkbox followed by a number reads back as a task line
fn checkbox_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[.?\]\s*\d").expect("checkbox marker pattern"))
}

/// An id comment in a task line is read back as the task's stable ID
fn id_comment_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<!--\s*id:").expect("id comment marker pattern"))
}

/// Resource limits enforced on `add`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_tasks: usize,
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_tasks: 10_000,
            max_depth: 10,
        }
    }
}

/// Adds a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddOperation {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Dotted position; its last segment is the slot among siblings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Requirement numbers, e.g. `1.2`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl AddOperation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn under(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn at(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn blocked_by<S: Into<String>>(mut self, refs: impl IntoIterator<Item = S>) -> Self {
        self.blocked_by = refs.into_iter().map(Into::into).collect();
        self
    }
}

/// Removes a task and its subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveOperation {
    pub id: String,
}

/// Changes fields of an existing task; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOperation {
    pub id: String,
    /// An empty title leaves the title unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    /// Replaces the blockers; an empty list clears them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<Vec<String>>,
    /// `0` unassigns the stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Clears the owner
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub release: bool,
}

impl UpdateOperation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn blocked_by<S: Into<String>>(mut self, refs: impl IntoIterator<Item = S>) -> Self {
        self.blocked_by = Some(refs.into_iter().map(Into::into).collect());
        self
    }
}

/// One edit within a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Add(AddOperation),
    Remove(RemoveOperation),
    Update(UpdateOperation),
}

impl Operation {
    pub fn remove(id: impl Into<String>) -> Self {
        Operation::Remove(RemoveOperation { id: id.into() })
    }

    /// Shorthand for an update that marks a task completed
    pub fn complete(id: impl Into<String>) -> Self {
        Operation::Update(UpdateOperation::new(id).status(TaskStatus::Completed))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Add(_) => "add",
            Operation::Remove(_) => "remove",
            Operation::Update(_) => "update",
        }
    }
}

impl From<AddOperation> for Operation {
    fn from(op: AddOperation) -> Self {
        Operation::Add(op)
    }
}

impl From<RemoveOperation> for Operation {
    fn from(op: RemoveOperation) -> Self {
        Operation::Remove(op)
    }
}

impl From<UpdateOperation> for Operation {
    fn from(op: UpdateOperation) -> Self {
        Operation::Update(op)
    }
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,

    /// Operations applied; 0 when the batch was rejected
    pub applied: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Rendered simulation, dry runs only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,

    /// Position IDs of parents completed as a side effect
    #[serde(default)]
    pub auto_completed: BTreeSet<String>,
}

impl BatchResult {
    fn rejected(message: String) -> Self {
        Self {
            success: false,
            errors: vec![message],
            ..Self::default()
        }
    }
}

/// Why a single operation was rejected
#[derive(Debug, Error, PartialEq)]
pub enum OperationError {
    #[error("{0} operation requires {1}")]
    MissingField(&'static str, &'static str),

    #[error("title exceeds {} characters", MAX_TITLE_LEN)]
    TitleTooLong,

    #[error("{0} contains control characters")]
    ControlCharacters(&'static str),

    #[error("title must not contain an id comment")]
    TitleIdComment,

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("parent task {0} not found")]
    ParentNotFound(String),

    #[error("invalid position format: {0}")]
    InvalidPosition(String),

    #[error("blocked-by task {0} not found")]
    BlockerNotFound(String),

    #[error("{}", describe_cycle(.0))]
    CircularDependency(Vec<StableId>),

    #[error("stream must be a positive integer, got {0}")]
    InvalidStream(i64),

    #[error("detail {index} {reason}")]
    InvalidDetail { index: usize, reason: &'static str },

    #[error("reference {index} {reason}")]
    InvalidReference { index: usize, reason: &'static str },

    #[error("requirement {index} has invalid format: {value}")]
    InvalidRequirement { index: usize, value: String },

    #[error("invalid requirements file: {0}")]
    InvalidRequirementsFile(String),

    #[error("maximum task limit of {0} reached")]
    TooManyTasks(usize),

    #[error("maximum hierarchy depth of {0} reached")]
    TooDeep(usize),

    #[error(transparent)]
    IdSpace(#[from] IdError),
}

fn describe_cycle(path: &[StableId]) -> String {
    match path {
        [a, b] if a == b => format!("task cannot depend on itself: {}", a),
        _ => {
            let chain: Vec<&str> = path.iter().map(StableId::as_str).collect();
            format!("circular dependency detected: {}", chain.join(" → "))
        }
    }
}

/// Failures that are not attributable to a caller mistake
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("could not prepare simulation: {0}")]
    Simulation(#[from] CodecError),

    #[error("operation {index}: {source}")]
    IdSpace { index: usize, source: IdError },

    #[error("operation {index} failed on replay after passing simulation: {source}")]
    Replay {
        index: usize,
        source: OperationError,
    },
}

/// Applies batches of operations through a codec-built simulation
pub struct BatchEngine<'c, C: DocumentCodec + ?Sized> {
    codec: &'c C,
    limits: Limits,
}

impl<'c, C: DocumentCodec + ?Sized> BatchEngine<'c, C> {
    pub fn new(codec: &'c C) -> Self {
        Self {
            codec,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs a batch
    ///
    /// On rejection the returned result has `success == false`, a single
    /// error naming the 1-based index of the failing operation as submitted,
    /// and `list` is untouched. With `dry_run` the list is never touched.
    pub fn execute(
        &self,
        list: &mut TaskList,
        operations: &[Operation],
        dry_run: bool,
    ) -> Result<BatchResult, BatchError> {
        let mut simulation = self.codec.decode(&self.codec.encode(list)?)?;
        // the file name only reaches the text once some task links to it
        if simulation.requirements_file.is_none() {
            simulation.requirements_file = list.requirements_file.clone();
        }
        let order = execution_order(operations);

        let mut simulated_completions = BTreeSet::new();
        for &index in &order {
            let op = &operations[index];
            let outcome = self
                .validate(&simulation, op)
                .and_then(|()| apply(&mut simulation, op, &mut simulated_completions));

            match outcome {
                Ok(()) => debug!(operation = index + 1, kind = op.kind(), "Simulated operation"),
                Err(OperationError::IdSpace(source)) => {
                    return Err(BatchError::IdSpace {
                        index: index + 1,
                        source,
                    })
                }
                Err(e) => {
                    debug!(operation = index + 1, error = %e, "Batch rejected");
                    return Ok(BatchResult::rejected(format!("operation {}: {}", index + 1, e)));
                }
            }
        }

        if dry_run {
            return Ok(BatchResult {
                success: true,
                applied: operations.len(),
                errors: Vec::new(),
                preview: Some(self.codec.encode(&simulation)?),
                auto_completed: simulated_completions,
            });
        }

        let mut committed = list.clone();
        let mut auto_completed = BTreeSet::new();
        for &index in &order {
            apply(&mut committed, &operations[index], &mut auto_completed).map_err(|source| {
                match source {
                    OperationError::IdSpace(source) => BatchError::IdSpace {
                        index: index + 1,
                        source,
                    },
                    source => BatchError::Replay {
                        index: index + 1,
                        source,
                    },
                }
            })?;
        }
        committed.touch();
        *list = committed;

        info!(
            applied = operations.len(),
            auto_completed = auto_completed.len(),
            "Batch committed"
        );

        Ok(BatchResult {
            success: true,
            applied: operations.len(),
            errors: Vec::new(),
            preview: None,
            auto_completed,
        })
    }

    /// Checks an operation against the current state without mutating it
    pub fn validate(&self, list: &TaskList, op: &Operation) -> Result<(), OperationError> {
        match op {
            Operation::Add(add) => self.validate_add(list, add),
            Operation::Remove(remove) => {
                require_id("remove", &remove.id)?;
                resolve_task(list, &remove.id).map(|_| ())
            }
            Operation::Update(update) => validate_update(list, update),
        }
    }

    fn validate_add(&self, list: &TaskList, add: &AddOperation) -> Result<(), OperationError> {
        if add.title.trim().is_empty() {
            return Err(OperationError::MissingField("add", "title"));
        }
        check_title(&add.title)?;

        let parent = match non_empty(&add.parent) {
            Some(parent) => Some(
                list.resolve(parent)
                    .ok_or_else(|| OperationError::ParentNotFound(parent.to_string()))?,
            ),
            None => None,
        };
        if let Some(position) = non_empty(&add.position) {
            parse_position(position)?;
        }

        if list.len() >= self.limits.max_tasks {
            return Err(OperationError::TooManyTasks(self.limits.max_tasks));
        }
        let depth = parent.as_ref().map_or(0, PositionId::depth) + 1;
        if depth > self.limits.max_depth {
            return Err(OperationError::TooDeep(self.limits.max_depth));
        }

        check_details(&add.details)?;
        check_references(&add.references)?;
        requirement_values(&add.requirements)?;
        check_stream(add.stream)?;
        check_owner(add.owner.as_deref())?;
        check_blockers(list, &add.blocked_by)
    }
}

fn validate_update(list: &TaskList, update: &UpdateOperation) -> Result<(), OperationError> {
    require_id("update", &update.id)?;
    resolve_task(list, &update.id)?;

    if let Some(title) = &update.title {
        if !title.trim().is_empty() {
            check_title(title)?;
        }
    }
    if let Some(details) = &update.details {
        check_details(details)?;
    }
    if let Some(references) = &update.references {
        check_references(references)?;
    }
    if let Some(requirements) = &update.requirements {
        requirement_values(requirements)?;
    }
    check_stream(update.stream)?;
    check_owner(update.owner.as_deref())?;
    if let Some(refs) = &update.blocked_by {
        check_blockers(list, refs)?;
    }
    Ok(())
}

/// Order in which a batch runs
///
/// Adds carrying a position go first, highest position first, so earlier
/// insertions never shift the slot a later one targets; ties keep their
/// submitted order. Every other operation follows in submitted order.
pub fn execution_order(operations: &[Operation]) -> Vec<usize> {
    let mut positioned: Vec<(usize, PositionId)> = Vec::new();
    let mut rest = Vec::new();

    for (index, op) in operations.iter().enumerate() {
        let position = match op {
            Operation::Add(add) => non_empty(&add.position).and_then(|p| p.parse().ok()),
            _ => None,
        };
        match position {
            Some(position) => positioned.push((index, position)),
            None => rest.push(index),
        }
    }

    positioned.sort_by(|a, b| b.1.cmp(&a.1));
    positioned.into_iter().map(|(i, _)| i).chain(rest).collect()
}

fn apply(
    list: &mut TaskList,
    op: &Operation,
    completed: &mut BTreeSet<String>,
) -> Result<(), OperationError> {
    match op {
        Operation::Add(add) => apply_add(list, add),
        Operation::Remove(remove) => {
            let position = resolve_task(list, &remove.id)?;
            list.remove(&position)
                .map(|_| ())
                .ok_or_else(|| OperationError::TaskNotFound(remove.id.clone()))
        }
        Operation::Update(update) => apply_update(list, update, completed),
    }
}

fn apply_add(list: &mut TaskList, add: &AddOperation) -> Result<(), OperationError> {
    let parent = match non_empty(&add.parent) {
        Some(parent) => Some(
            list.resolve(parent)
                .ok_or_else(|| OperationError::ParentNotFound(parent.to_string()))?,
        ),
        None => None,
    };
    let slot = match non_empty(&add.position) {
        Some(position) => Some(parse_position(position)?.slot()),
        None => None,
    };

    // Blockers resolve against the tree as it was before the insert
    let blockers = resolve_blockers(list, &add.blocked_by)?;

    let mut task = Task::new(PositionId::root(1), add.title.trim());
    task.details = trimmed(&add.details);
    task.references = trimmed(&add.references);
    task.requirements = requirement_values(&add.requirements)?;
    task.stream = stream_value(add.stream)?;
    task.owner = add.owner.as_deref().and_then(owner_value);

    let has_blockers = !blockers.is_empty();
    if has_blockers {
        task.stable_id = Some(list.next_stable_id()?);
        task.blocked_by = blockers;
    }

    let parent_label = add.parent.clone().unwrap_or_default();
    list.insert(parent.as_ref(), slot, task)
        .ok_or(OperationError::ParentNotFound(parent_label))?;

    if has_blockers {
        ensure_acyclic(list)?;
    }
    Ok(())
}

fn apply_update(
    list: &mut TaskList,
    update: &UpdateOperation,
    completed: &mut BTreeSet<String>,
) -> Result<(), OperationError> {
    let target = resolve_task(list, &update.id)?;

    let blockers = match &update.blocked_by {
        Some(refs) => Some(resolve_blockers(list, refs)?),
        None => None,
    };
    let links_added = blockers.as_ref().is_some_and(|b| !b.is_empty());
    if links_added {
        list.ensure_stable_id(&target)?;
    }

    let task = list
        .find_mut(&target)
        .ok_or_else(|| OperationError::TaskNotFound(update.id.clone()))?;

    if let Some(title) = &update.title {
        let title = title.trim();
        if !title.is_empty() {
            task.title = title.to_string();
        }
    }
    if let Some(details) = &update.details {
        task.details = trimmed(details);
    }
    if let Some(references) = &update.references {
        task.references = trimmed(references);
    }
    if let Some(requirements) = &update.requirements {
        task.requirements = requirement_values(requirements)?;
    }
    if let Some(blockers) = blockers {
        task.blocked_by = blockers;
    }
    if update.stream.is_some() {
        task.stream = stream_value(update.stream)?;
    }
    if let Some(owner) = &update.owner {
        task.owner = owner_value(owner);
    }
    if update.release {
        task.owner = None;
    }

    let became_complete = match update.status {
        Some(status) => {
            task.status = status;
            status.is_complete()
        }
        None => false,
    };

    if links_added {
        ensure_acyclic(list)?;
    }

    if became_complete {
        for promoted in propagate_completion(list, &target) {
            completed.insert(promoted.to_string());
        }
    }
    Ok(())
}

fn resolve_task(list: &TaskList, id: &str) -> Result<PositionId, OperationError> {
    list.resolve(id)
        .ok_or_else(|| OperationError::TaskNotFound(id.to_string()))
}

/// Resolves blocker references to stable IDs, assigning IDs where missing
fn resolve_blockers(list: &mut TaskList, refs: &[String]) -> Result<Vec<StableId>, OperationError> {
    let mut resolved = Vec::with_capacity(refs.len());
    for reference in refs {
        let position = list
            .resolve(reference)
            .ok_or_else(|| OperationError::BlockerNotFound(reference.clone()))?;
        if let Some(id) = list.ensure_stable_id(&position)? {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
    }
    Ok(resolved)
}

/// Checks that every blocker reference names an existing task
fn check_blockers(list: &TaskList, refs: &[String]) -> Result<(), OperationError> {
    match refs.iter().find(|r| list.resolve(r).is_none()) {
        Some(missing) => Err(OperationError::BlockerNotFound(missing.clone())),
        None => Ok(()),
    }
}

fn ensure_acyclic(list: &TaskList) -> Result<(), OperationError> {
    match DependencyGraph::from_list(list).find_cycle() {
        Some(path) => Err(OperationError::CircularDependency(path)),
        None => Ok(()),
    }
}

fn require_id(kind: &'static str, id: &str) -> Result<(), OperationError> {
    if id.trim().is_empty() {
        return Err(OperationError::MissingField(kind, "id"));
    }
    Ok(())
}

fn parse_position(position: &str) -> Result<PositionId, OperationError> {
    position
        .trim()
        .parse()
        .map_err(|_| OperationError::InvalidPosition(position.to_string()))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn has_control(value: &str) -> bool {
    value.chars().any(char::is_control)
}

fn check_title(title: &str) -> Result<(), OperationError> {
    let title = title.trim();
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(OperationError::TitleTooLong);
    }
    if has_control(title) {
        return Err(OperationError::ControlCharacters("title"));
    }
    if id_comment_marker().is_match(title) {
        return Err(OperationError::TitleIdComment);
    }
    Ok(())
}

fn check_details(details: &[String]) -> Result<(), OperationError> {
    for (i, detail) in details.iter().enumerate() {
        let index = i + 1;
        let detail = detail.trim();
        let reason = if detail.is_empty() {
            "is empty"
        } else if detail.chars().count() > MAX_DETAIL_LEN {
            "exceeds maximum length of 1000 characters"
        } else if has_control(detail) {
            "contains control characters"
        } else if is_reserved_detail(detail) {
            "starts with a reserved metadata label"
        } else if checkbox_marker().is_match(detail) {
            "looks like a task line"
        } else {
            continue;
        };
        return Err(OperationError::InvalidDetail { index, reason });
    }
    Ok(())
}

fn is_reserved_detail(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    RESERVED_DETAIL_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

fn check_references(references: &[String]) -> Result<(), OperationError> {
    for (i, reference) in references.iter().enumerate() {
        let index = i + 1;
        let reference = reference.trim();
        let reason = if reference.is_empty() {
            "is empty"
        } else if reference.chars().count() > MAX_REFERENCE_LEN {
            "exceeds maximum length of 500 characters"
        } else if has_control(reference) {
            "contains control characters"
        } else if reference.contains(',') {
            "contains a comma"
        } else {
            continue;
        };
        return Err(OperationError::InvalidReference { index, reason });
    }
    Ok(())
}

/// Parses requirement numbers; they use the same dotted form as positions
fn requirement_values(requirements: &[String]) -> Result<Vec<PositionId>, OperationError> {
    requirements
        .iter()
        .enumerate()
        .map(|(i, requirement)| {
            requirement
                .trim()
                .parse()
                .map_err(|_| OperationError::InvalidRequirement {
                    index: i + 1,
                    value: requirement.clone(),
                })
        })
        .collect()
}

/// Checks a path that requirement links can carry
///
/// The link syntax cannot hold `#`, parentheses or commas in the target.
pub fn check_requirements_file(path: &str) -> Result<(), OperationError> {
    let trimmed = path.trim();
    let unusable = trimmed.is_empty()
        || has_control(trimmed)
        || trimmed.contains(['#', '(', ')', ',', '[', ']']);
    if unusable {
        return Err(OperationError::InvalidRequirementsFile(path.to_string()));
    }
    Ok(())
}

fn check_stream(stream: Option<i64>) -> Result<(), OperationError> {
    stream_value(stream).map(|_| ())
}

fn stream_value(stream: Option<i64>) -> Result<Option<u32>, OperationError> {
    match stream {
        None | Some(0) => Ok(None),
        Some(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| OperationError::InvalidStream(n)),
    }
}

fn check_owner(owner: Option<&str>) -> Result<(), OperationError> {
    match owner {
        Some(owner) if has_control(owner) => Err(OperationError::ControlCharacters("owner")),
        _ => Ok(()),
    }
}

fn owner_value(owner: &str) -> Option<String> {
    let owner = owner.trim();
    (!owner.is_empty()).then(|| owner.to_string())
}

fn trimmed(lines: &[String]) -> Vec<String> {
    lines.iter().map(|l| l.trim().to_string()).collect()
}
