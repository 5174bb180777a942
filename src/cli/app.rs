//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{batch, query, task};
use crate::domain::TaskStatus;
use crate::storage::Config;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(author, version, about = "Hierarchical markdown task lists with transactional edits")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Task list file (defaults to the configured file, then tasks.md)
    #[arg(long, short = 'F', global = true, env = "TASKLIST_FILE")]
    pub file: Option<PathBuf>,

    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new, empty task list
    Create {
        /// Document title
        title: String,
    },

    /// Show the task list, optionally filtered
    ///
    /// Examples:
    ///   tasklist list --filter pending --stream 2
    ///   tasklist list --owner ""
    List(task::ListArgs),

    /// Add a task
    ///
    /// Examples:
    ///   tasklist add "Write docs"
    ///   tasklist add "Subtask" --parent 2
    ///   tasklist add "Goes first" --position 1
    Add(task::AddArgs),

    /// Update fields of a task
    Update(task::UpdateArgs),

    /// Mark a task as in progress
    Start {
        /// Position (e.g. 1.2) or stable ID
        id: String,
    },

    /// Mark a task as completed
    Complete {
        /// Position (e.g. 1.2) or stable ID
        id: String,
    },

    /// Mark a task as pending again
    Uncomplete {
        /// Position (e.g. 1.2) or stable ID
        id: String,
    },

    /// Remove a task and its subtasks
    Remove {
        /// Position (e.g. 1.2) or stable ID
        id: String,
    },

    /// Apply a JSON batch of operations atomically
    Batch(batch::BatchArgs),

    /// Show the next task with outstanding work, or claim ready tasks
    ///
    /// Examples:
    ///   tasklist next --one
    ///   tasklist next --claim agent-1
    ///   tasklist next --stream 2 --claim agent-2
    Next(query::NextArgs),

    /// Find tasks by text
    Find(query::FindArgs),

    /// Show ready, blocked and active tasks per work stream
    Streams,

    /// Show task counts per status
    Stats,
}

/// Shared state for one command invocation
pub struct Session {
    pub config: Config,
    pub output: Output,
    file: Option<PathBuf>,
}

impl Session {
    /// The task list this invocation works on
    pub fn task_file(&self) -> PathBuf {
        self.config.task_file(self.file.as_deref())
    }

    /// Resolves a file named by a batch request, falling back to the session's
    pub fn task_file_or(&self, file: Option<&Path>) -> PathBuf {
        match file {
            Some(file) => file.to_path_buf(),
            None => self.task_file(),
        }
    }
}

/// Installs the stderr log subscriber
///
/// `TASKLIST_LOG` takes the usual filter directives; without it only
/// warnings are shown, or debug output with `--verbose`.
fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var("TASKLIST_LOG")
        .from_env_lossy();

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let format = cli
        .format
        .unwrap_or_else(|| config.global.default_format.into());
    let session = Session {
        output: Output::new(format, cli.verbose),
        config,
        file: cli.file,
    };

    if let Some(root) = &session.config.project_root {
        session
            .output
            .verbose_ctx("config", &format!("Project root: {}", root.display()));
    }

    match cli.command {
        Commands::Create { title } => task::create(&session, &title)?,
        Commands::List(args) => task::list(&session, args)?,
        Commands::Add(args) => task::add(&session, args)?,
        Commands::Update(args) => task::update(&session, args)?,
        Commands::Start { id } => task::set_status(&session, &id, TaskStatus::InProgress)?,
        Commands::Complete { id } => task::set_status(&session, &id, TaskStatus::Completed)?,
        Commands::Uncomplete { id } => task::set_status(&session, &id, TaskStatus::Pending)?,
        Commands::Remove { id } => task::remove(&session, &id)?,
        Commands::Batch(args) => batch::run(&session, args)?,
        Commands::Next(args) => query::next(&session, args)?,
        Commands::Find(args) => query::find(&session, args)?,
        Commands::Streams => query::streams(&session)?,
        Commands::Stats => query::stats(&session)?,
    }

    Ok(())
}
