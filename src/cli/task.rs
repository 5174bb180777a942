//! Task CLI commands

use anyhow::Result;
use clap::Args;

use super::app::Session;
use super::batch::execute_one;
use crate::domain::{
    filter_tasks, AddOperation, BatchResult, Operation, TaskFilter, TaskStatus, UpdateOperation,
};
use crate::storage::DocumentStore;

#[derive(Args)]
pub struct ListArgs {
    /// Only tasks with this status (pending, in_progress, completed)
    #[arg(long = "filter", value_name = "STATUS")]
    pub status: Option<TaskStatus>,

    /// Only tasks in this stream; unassigned tasks count as stream 1
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub stream: Option<u32>,

    /// Only tasks claimed by this owner; an empty value selects unowned tasks
    #[arg(long)]
    pub owner: Option<String>,
}

impl From<ListArgs> for TaskFilter {
    fn from(args: ListArgs) -> Self {
        Self {
            status: args.status,
            stream: args.stream,
            owner: args.owner.map(|o| o.trim().to_string()),
            ..TaskFilter::default()
        }
    }
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,

    /// Parent task (position or stable ID)
    #[arg(long, short)]
    pub parent: Option<String>,

    /// Position to insert at, e.g. 2 or 1.3; later siblings shift down
    #[arg(long)]
    pub position: Option<String>,

    /// Tasks that must complete first (comma separated stable IDs or positions)
    #[arg(long, value_delimiter = ',')]
    pub blocked_by: Vec<String>,

    /// Work stream (positive integer)
    #[arg(long)]
    pub stream: Option<i64>,

    /// Owner claiming the task
    #[arg(long)]
    pub owner: Option<String>,

    /// Detail line (repeatable)
    #[arg(long = "detail", short = 'd')]
    pub details: Vec<String>,

    /// Reference path or URL (repeatable)
    #[arg(long = "reference", short = 'r')]
    pub references: Vec<String>,

    /// Requirement numbers (comma separated, e.g. 1.1,2.3)
    #[arg(long, value_delimiter = ',')]
    pub requirements: Vec<String>,

    /// File the requirement links point at (default requirements.md)
    #[arg(long)]
    pub requirements_file: Option<String>,
}

impl From<AddArgs> for AddOperation {
    fn from(args: AddArgs) -> Self {
        Self {
            title: args.title,
            parent: args.parent,
            position: args.position,
            details: args.details,
            references: args.references,
            requirements: args.requirements,
            blocked_by: args.blocked_by,
            stream: args.stream,
            owner: args.owner,
        }
    }
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Task to update (position or stable ID)
    pub id: String,

    /// New title
    #[arg(long, short)]
    pub title: Option<String>,

    /// New status (pending, in_progress, completed)
    #[arg(long, short)]
    pub status: Option<TaskStatus>,

    /// Replace the detail lines (repeatable)
    #[arg(long = "detail", short = 'd')]
    pub details: Option<Vec<String>>,

    /// Replace the references (repeatable)
    #[arg(long = "reference", short = 'r')]
    pub references: Option<Vec<String>>,

    /// Replace the requirement numbers; pass an empty value to clear them
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    pub requirements: Option<Vec<String>>,

    /// Replace the dependencies; pass an empty value to clear them
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    pub blocked_by: Option<Vec<String>>,

    /// Move the task to a work stream
    #[arg(long)]
    pub stream: Option<i64>,

    /// Claim the task for an owner
    #[arg(long, conflicts_with = "release")]
    pub owner: Option<String>,

    /// Clear the owner
    #[arg(long)]
    pub release: bool,
}

impl From<UpdateArgs> for UpdateOperation {
    fn from(args: UpdateArgs) -> Self {
        Self {
            id: args.id,
            title: args.title,
            status: args.status,
            details: args.details,
            references: args.references,
            requirements: args.requirements.map(drop_blank),
            blocked_by: args.blocked_by.map(drop_blank),
            stream: args.stream,
            owner: args.owner,
            release: args.release,
        }
    }
}

fn drop_blank(values: Vec<String>) -> Vec<String> {
    values.into_iter().filter(|v| !v.trim().is_empty()).collect()
}

pub fn create(session: &Session, title: &str) -> Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("Title must not be empty");
    }

    let store = DocumentStore::new(session.task_file());
    let list = store.create(title)?;

    if session.output.is_json() {
        session.output.data(&serde_json::json!({
            "file": store.path().display().to_string(),
            "title": list.title,
        }));
    } else {
        session
            .output
            .success(&format!("Created task list: {}", store.path().display()));
    }
    Ok(())
}

pub fn list(session: &Session, args: ListArgs) -> Result<()> {
    let store = DocumentStore::new(session.task_file());
    let list = store.load()?;
    let filter = TaskFilter::from(args);

    if filter.is_empty() {
        if session.output.is_json() {
            session.output.data(&list);
        } else {
            session.output.tree(&list);
        }
        return Ok(());
    }

    let matches = filter_tasks(&list, &filter);
    session.output.verbose_ctx(
        "list",
        &format!("{} of {} tasks match", matches.len(), list.len()),
    );

    if session.output.is_json() {
        session.output.data(&matches);
    } else if matches.is_empty() {
        println!("No tasks found matching filters: {}", describe_filter(&filter));
    } else {
        session.output.rows(&matches);
    }
    Ok(())
}

fn describe_filter(filter: &TaskFilter) -> String {
    let mut parts = Vec::new();
    if let Some(status) = filter.status {
        parts.push(format!("status={}", status));
    }
    if let Some(stream) = filter.stream {
        parts.push(format!("stream={}", stream));
    }
    match filter.owner.as_deref() {
        Some("") => parts.push("owner=(unowned)".to_string()),
        Some(owner) => parts.push(format!("owner={}", owner)),
        None => {}
    }
    parts.join(", ")
}

pub fn add(session: &Session, mut args: AddArgs) -> Result<()> {
    let title = args.title.trim().to_string();
    let requirements_file = args.requirements_file.take();
    let result = execute_one(
        session,
        AddOperation::from(args).into(),
        requirements_file.as_deref(),
    )?;
    report(session, &result, &format!("Added task: {}", title));
    Ok(())
}

pub fn update(session: &Session, args: UpdateArgs) -> Result<()> {
    let id = args.id.clone();
    let result = execute_one(session, UpdateOperation::from(args).into(), None)?;
    report(session, &result, &format!("Updated task {}", id));
    Ok(())
}

pub fn set_status(session: &Session, id: &str, status: TaskStatus) -> Result<()> {
    let operation: Operation = UpdateOperation::new(id).status(status).into();
    let result = execute_one(session, operation, None)?;

    let message = match status {
        TaskStatus::Pending => format!("Reopened task {}", id),
        TaskStatus::InProgress => format!("Started task {}", id),
        TaskStatus::Completed => format!("Completed task {}", id),
    };
    report(session, &result, &message);
    Ok(())
}

pub fn remove(session: &Session, id: &str) -> Result<()> {
    let result = execute_one(session, Operation::remove(id), None)?;
    report(session, &result, &format!("Removed task {}", id));
    Ok(())
}

fn report(session: &Session, result: &BatchResult, message: &str) {
    if session.output.is_json() {
        session.output.data(result);
        return;
    }

    session.output.success(message);
    for id in &result.auto_completed {
        println!("Auto-completed parent task {}", id);
    }
}
