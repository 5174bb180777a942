//! Query commands (next, find, streams, stats)

use anyhow::Result;
use clap::Args;

use super::app::Session;
use super::batch;
use crate::domain::{
    analyze_streams, find_tasks, first_incomplete_path, next_task, ready_tasks, NextTask,
    Operation, PositionId, SearchOptions, TaskFilter, TaskStatus, TaskSummary, UpdateOperation,
};
use crate::storage::DocumentStore;

#[derive(Args)]
pub struct NextArgs {
    /// Only consider ready tasks in this stream
    #[arg(long, short, value_parser = clap::value_parser!(u32).range(1..))]
    pub stream: Option<u32>,

    /// Claim for an owner and mark in progress: every ready task in --stream,
    /// otherwise the first ready task
    #[arg(long, short, value_name = "OWNER")]
    pub claim: Option<String>,

    /// Show only the first incomplete subtask at each level
    #[arg(long, conflicts_with = "claim")]
    pub one: bool,
}

#[derive(Args)]
pub struct FindArgs {
    /// Text to look for; case-insensitive unless --case-sensitive
    pub pattern: String,

    /// Also search detail lines
    #[arg(long)]
    pub search_details: bool,

    /// Also search references
    #[arg(long)]
    pub search_refs: bool,

    #[arg(long)]
    pub case_sensitive: bool,

    /// Only tasks with this status
    #[arg(long)]
    pub status: Option<TaskStatus>,

    /// Deepest level to include; root tasks are level 1
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_depth: Option<u64>,

    /// Only direct children of this task (position or stable ID)
    #[arg(long)]
    pub parent: Option<String>,
}

/// Show the next task with outstanding work, or claim ready tasks
pub fn next(session: &Session, args: NextArgs) -> Result<()> {
    if let Some(owner) = &args.claim {
        return claim(session, owner, args.stream);
    }

    let list = DocumentStore::new(session.task_file()).load()?;

    if args.one {
        let path = first_incomplete_path(&list);
        if session.output.is_json() {
            let steps: Vec<TaskSummary> = path.into_iter().map(TaskSummary::from).collect();
            session.output.data(&steps);
        } else if path.is_empty() {
            println!("All tasks are complete.");
        } else {
            for (depth, task) in path.iter().enumerate() {
                println!(
                    "{}{} {}. {}",
                    "  ".repeat(depth),
                    task.status.checkbox(),
                    task.id,
                    task.title
                );
            }
        }
        return Ok(());
    }

    let next = match args.stream {
        Some(stream) => ready_tasks(&list, Some(stream))
            .into_iter()
            .next()
            .map(NextTask::of),
        None => next_task(&list),
    };

    if session.output.is_json() {
        session.output.data(&next);
        return Ok(());
    }

    match next {
        None => match args.stream {
            Some(stream) => println!("No ready tasks in stream {}.", stream),
            None => println!("All tasks are complete."),
        },
        Some(next) => {
            println!("{} {}. {}", next.task.status.checkbox(), next.task.id, next.task.title);
            for detail in &next.task.details {
                println!("    {}", detail);
            }
            if !next.incomplete_children.is_empty() {
                println!();
                println!("Remaining subtasks:");
                for child in &next.incomplete_children {
                    println!("  {} {}. {}", child.status.checkbox(), child.id, child.title);
                }
            }
        }
    }

    Ok(())
}

/// Marks ready tasks as in progress for `owner` through the batch engine
fn claim(session: &Session, owner: &str, stream: Option<u32>) -> Result<()> {
    let owner = owner.trim();
    if owner.is_empty() {
        anyhow::bail!("Owner must not be empty");
    }

    let path = session.task_file();
    let list = DocumentStore::new(&path).load()?;
    let ready = ready_tasks(&list, stream);
    let targets: Vec<PositionId> = match stream {
        Some(_) => ready.iter().map(|t| t.id.clone()).collect(),
        None => ready.first().map(|t| t.id.clone()).into_iter().collect(),
    };

    if targets.is_empty() {
        if session.output.is_json() {
            session.output.data(&serde_json::json!({ "owner": owner, "claimed": [] }));
        } else {
            match stream {
                Some(stream) => println!("No ready tasks to claim in stream {}.", stream),
                None => println!("No ready tasks to claim."),
            }
        }
        return Ok(());
    }

    let operations: Vec<Operation> = targets
        .iter()
        .map(|id| {
            UpdateOperation {
                owner: Some(owner.to_string()),
                ..UpdateOperation::new(id.to_string()).status(TaskStatus::InProgress)
            }
            .into()
        })
        .collect();
    let result = batch::execute(session, &path, &operations, false, None)?;
    if !result.success {
        anyhow::bail!("{}", result.errors.join("; "));
    }

    // updates never move tasks, so the positions still hold
    let list = DocumentStore::new(&path).load()?;
    let claimed: Vec<TaskSummary> = targets
        .iter()
        .filter_map(|id| list.find(id))
        .map(TaskSummary::from)
        .collect();

    if session.output.is_json() {
        session
            .output
            .data(&serde_json::json!({ "owner": owner, "claimed": claimed }));
    } else {
        for task in &claimed {
            println!("Claimed task {}: {}", task.id, task.title);
        }
    }
    Ok(())
}

/// Search task titles, and optionally details and references
pub fn find(session: &Session, args: FindArgs) -> Result<()> {
    if args.pattern.trim().is_empty() {
        anyhow::bail!("Pattern must not be empty");
    }

    let list = DocumentStore::new(session.task_file()).load()?;
    let parent = match &args.parent {
        Some(parent) => Some(
            list.resolve(parent)
                .ok_or_else(|| anyhow::anyhow!("Task {} not found", parent))?,
        ),
        None => None,
    };

    let options = SearchOptions {
        case_sensitive: args.case_sensitive,
        details: args.search_details,
        references: args.search_refs,
    };
    let filter = TaskFilter {
        status: args.status,
        max_depth: args.max_depth.and_then(|d| usize::try_from(d).ok()),
        parent,
        ..TaskFilter::default()
    };
    let matches = find_tasks(&list, &args.pattern, options, &filter);

    session.output.verbose_ctx(
        "find",
        &format!("{} of {} tasks match '{}'", matches.len(), list.len(), args.pattern),
    );

    if session.output.is_json() {
        session.output.data(&matches);
    } else if matches.is_empty() {
        println!("No tasks found matching pattern: {}", args.pattern);
    } else {
        println!("Found {} tasks matching '{}':", matches.len(), args.pattern);
        session.output.rows(&matches);
    }
    Ok(())
}

/// Show ready, blocked and active tasks per stream
pub fn streams(session: &Session) -> Result<()> {
    let list = DocumentStore::new(session.task_file()).load()?;
    let report = analyze_streams(&list);

    session.output.verbose_ctx(
        "streams",
        &format!("Analyzed {} tasks in {} streams", list.len(), report.streams.len()),
    );

    if session.output.is_json() {
        session.output.data(&report);
        return Ok(());
    }

    if report.streams.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    println!("{:<8} {:<20} {:<20} ACTIVE", "STREAM", "READY", "BLOCKED");
    println!("{}", "-".repeat(60));
    for stream in &report.streams {
        println!(
            "{:<8} {:<20} {:<20} {}",
            stream.id,
            join_or_dash(&stream.ready),
            join_or_dash(&stream.blocked),
            join_or_dash(&stream.active)
        );
    }

    println!();
    if report.available.is_empty() {
        println!("No stream has ready work.");
    } else {
        let available: Vec<String> = report.available.iter().map(u32::to_string).collect();
        println!("Available streams: {}", available.join(", "));
    }

    Ok(())
}

/// Show task counts per status
pub fn stats(session: &Session) -> Result<()> {
    let list = DocumentStore::new(session.task_file()).load()?;
    let stats = list.stats();

    if session.output.is_json() {
        session.output.data(&stats);
    } else {
        println!("{}", list.title);
        println!();
        println!("Tasks:");
        println!("  Total:       {}", stats.total);
        println!("  Pending:     {}", stats.pending);
        println!("  In progress: {}", stats.in_progress);
        println!("  Completed:   {}", stats.completed);
    }

    Ok(())
}

fn join_or_dash(ids: &[String]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.join(",")
    }
}
