//! # Storage Layer
//!
//! Persistence for task lists as plain markdown files.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Task list | Markdown + YAML front matter | any path, `tasks.md` by default |
//! | Project config | TOML | `.tasklist.toml` at the project root |
//! | Global config | TOML | `<config dir>/tasklist/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`DocumentStore`] uses file locking (`fs2`) for concurrent access
//! - All writes are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`MarkdownCodec`] - Renders and parses the markdown task format
//! - [`DocumentStore`] - Reads and writes one task list file
//! - [`Config`] - Project and global configuration

mod config;
mod document;
mod markdown;

pub use config::{
    BatchConfig, Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig,
    DEFAULT_TASK_FILE, PROJECT_CONFIG_FILE,
};
pub use document::DocumentStore;
pub use markdown::{MarkdownCodec, MAX_DOCUMENT_BYTES};
