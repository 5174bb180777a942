//! Batch command and the shared path every edit command takes
//!
//! Single-task commands build one operation and go through the same engine
//! as `tasklist batch`, so they get identical validation and atomicity.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use super::app::Session;
use crate::domain::{check_requirements_file, BatchEngine, BatchResult, Operation};
use crate::storage::DocumentStore;

/// JSON accepted by `tasklist batch`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRequest {
    /// Task list to edit; falls back to `--file` and then the configured file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    pub operations: Vec<Operation>,

    pub dry_run: bool,

    /// Where requirement links point; kept by the file from then on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements_file: Option<String>,
}

#[derive(Args)]
pub struct BatchArgs {
    /// File containing the JSON request (reads stdin when omitted)
    #[arg(value_name = "INPUT")]
    pub path: Option<PathBuf>,

    /// JSON request given inline
    #[arg(long = "input", short = 'i', value_name = "JSON", conflicts_with = "path")]
    pub json: Option<String>,

    /// Validate and preview without writing the file
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(session: &Session, args: BatchArgs) -> Result<()> {
    let raw = read_input(&args)?;
    let mut request: BatchRequest =
        serde_json::from_str(&raw).context("Failed to parse batch request")?;

    if request.operations.is_empty() {
        anyhow::bail!("At least one operation is required");
    }
    let max = session.config.max_operations();
    if request.operations.len() > max {
        anyhow::bail!("Maximum of {} operations allowed per batch, got {}", max, request.operations.len());
    }
    if args.dry_run {
        request.dry_run = true;
    }

    let path = session.task_file_or(request.file.as_deref());
    session.output.verbose_ctx(
        "batch",
        &format!(
            "Applying {} operations to {} (dry run: {})",
            request.operations.len(),
            path.display(),
            request.dry_run
        ),
    );

    let result = execute(
        session,
        &path,
        &request.operations,
        request.dry_run,
        request.requirements_file.as_deref(),
    )?;

    if session.output.is_json() {
        session.output.data(&result);
    } else {
        print_result(&result, request.dry_run);
    }

    if !result.success {
        anyhow::bail!("Batch rejected, no changes were made");
    }
    Ok(())
}

/// Loads the list, runs the engine and saves when something was committed
///
/// A `requirements_file` is set on the list before the engine runs, so the
/// preview already links to it.
pub fn execute(
    session: &Session,
    path: &Path,
    operations: &[Operation],
    dry_run: bool,
    requirements_file: Option<&str>,
) -> Result<BatchResult> {
    let store = DocumentStore::new(path);
    let mut list = store.load()?;

    if let Some(file) = requirements_file {
        check_requirements_file(file)?;
        list.requirements_file = Some(file.trim().to_string());
    }

    let engine = BatchEngine::new(store.codec()).with_limits(session.config.limits());
    let result = engine
        .execute(&mut list, operations, dry_run)
        .with_context(|| format!("Failed to apply operations to {}", path.display()))?;

    if result.success && !dry_run {
        store.save(&list)?;
        session
            .output
            .verbose_ctx("batch", &format!("Saved {}", path.display()));
    }
    Ok(result)
}

/// Runs a single operation, turning a rejection into an error
pub fn execute_one(
    session: &Session,
    operation: Operation,
    requirements_file: Option<&str>,
) -> Result<BatchResult> {
    let path = session.task_file();
    let result = execute(
        session,
        &path,
        std::slice::from_ref(&operation),
        false,
        requirements_file,
    )?;
    if !result.success {
        anyhow::bail!("{}", result.errors.join("; "));
    }
    Ok(result)
}

fn read_input(args: &BatchArgs) -> Result<String> {
    if let Some(json) = &args.json {
        return Ok(json.clone());
    }
    match &args.path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch input: {}", path.display())),
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read batch input from stdin")?;
            Ok(raw)
        }
    }
}

fn print_result(result: &BatchResult, dry_run: bool) {
    if !result.success {
        println!("Batch rejected:");
        for error in &result.errors {
            println!("  {}", error);
        }
        return;
    }

    if dry_run {
        println!("Dry run successful: {} operations validated", result.applied);
    } else {
        println!("Batch applied: {} operations", result.applied);
    }

    if !result.auto_completed.is_empty() {
        println!();
        println!("Auto-completed parent tasks:");
        for id in &result.auto_completed {
            println!("  {}", id);
        }
    }

    if let Some(preview) = &result.preview {
        println!();
        println!("Preview:");
        println!("---");
        print!("{}", preview);
        println!("---");
    }
}
