//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Document | Create and show a task list | `create`, `list --filter pending` |
//! | Task | Edit single tasks | `add`, `update`, `complete`, `remove` |
//! | Batch | Atomic multi-operation edits | `batch ops.json --dry-run` |
//! | Query | Views and claiming | `next --claim agent-1`, `find api`, `streams`, `stats` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output; `TASKLIST_LOG` accepts
//! tracing filter directives:
//! ```bash
//! TASKLIST_LOG=tasklist_cli=debug tasklist batch ops.json
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod batch;
mod output;
mod query;
mod task;

pub use app::{run, Cli, Commands, Session};
pub use batch::{BatchArgs, BatchRequest};
pub use output::{Output, OutputFormat};
pub use query::{FindArgs, NextArgs};
pub use task::{AddArgs, ListArgs, UpdateArgs};
