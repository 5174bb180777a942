//! Output formatting for CLI commands

use serde::Serialize;

use crate::domain::{Task, TaskList};
use crate::storage;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => Self::Text,
            storage::OutputFormat::Json => Self::Json,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text => {
                // Text callers that have no table layout fall back to pretty JSON
                if let Ok(json) = serde_json::to_string_pretty(data) {
                    println!("{}", json);
                }
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(data) {
                    println!("{}", json);
                }
            }
        }
    }

    /// Prints a task list as an indented tree (text only)
    pub fn tree(&self, list: &TaskList) {
        if self.format != OutputFormat::Text {
            return;
        }
        println!("{}", list.title);
        if list.is_empty() {
            println!("No tasks.");
            return;
        }
        for task in &list.tasks {
            print_task(task, 0);
        }
    }

    /// Prints tasks one per line without their subtasks, indented by level
    /// (text only)
    pub fn rows(&self, tasks: &[&Task]) {
        if self.format != OutputFormat::Text {
            return;
        }
        for task in tasks {
            println!("{}", task_line(task, task.id.depth().saturating_sub(1)));
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}

fn print_task(task: &Task, depth: usize) {
    println!("{}", task_line(task, depth));

    for child in &task.children {
        print_task(child, depth + 1);
    }
}

fn task_line(task: &Task, depth: usize) -> String {
    let mut line = format!(
        "{}{} {}. {}",
        "  ".repeat(depth),
        task.status.checkbox(),
        task.id,
        task.title
    );
    if let Some(id) = &task.stable_id {
        line.push_str(&format!("  [{}]", id));
    }
    if !task.blocked_by.is_empty() {
        let blockers: Vec<&str> = task.blocked_by.iter().map(|b| b.as_str()).collect();
        line.push_str(&format!("  blocked by {}", blockers.join(", ")));
    }
    if let Some(owner) = &task.owner {
        line.push_str(&format!("  @{}", owner));
    }
    line
}
