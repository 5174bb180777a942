//! File storage for task lists
//!
//! Each task list lives in one markdown file. Reads take a shared lock;
//! writes go to a sibling temp file under an exclusive lock and are renamed
//! over the existing file.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

use super::markdown::MarkdownCodec;
use crate::domain::{DocumentCodec, TaskList};

/// Store for a single task list file
pub struct DocumentStore {
    path: PathBuf,
    codec: MarkdownCodec,
}

impl DocumentStore {
    /// Creates a store for the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            codec: MarkdownCodec,
        }
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The codec used for this file
    pub fn codec(&self) -> &MarkdownCodec {
        &self.codec
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads and decodes the task list
    pub fn load(&self) -> Result<TaskList> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open task list: {}", self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .context("Failed to acquire read lock on task list")?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .with_context(|| format!("Failed to read task list: {}", self.path.display()))?;

        let mut list = self
            .codec
            .decode(&content)
            .with_context(|| format!("Failed to parse task list: {}", self.path.display()))?;

        if let Ok(modified) = file.metadata().and_then(|m| m.modified()) {
            list.modified = modified.into();
        }

        debug!(path = %self.path.display(), tasks = list.len(), "Loaded task list");
        // Lock is released when file is dropped
        Ok(list)
    }

    /// Encodes and writes the task list atomically
    pub fn save(&self, list: &TaskList) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.temp_path();
        let content = self
            .codec
            .encode(list)
            .with_context(|| format!("Failed to encode task list: {}", self.path.display()))?;

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .context("Failed to acquire write lock on task list")?;

            file.write_all(content.as_bytes())
                .context("Failed to write task list")?;
            file.sync_all().context("Failed to flush task list")?;
        }

        // Keep the permissions of the file being replaced
        if let Ok(metadata) = fs::metadata(&self.path) {
            fs::set_permissions(&temp_path, metadata.permissions()).with_context(|| {
                format!("Failed to copy permissions to {}", temp_path.display())
            })?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        debug!(path = %self.path.display(), bytes = content.len(), "Saved task list");
        Ok(())
    }

    /// Writes a new, empty task list; fails if the file exists
    pub fn create(&self, title: &str) -> Result<TaskList> {
        if self.path.exists() {
            anyhow::bail!("Task list already exists: {}", self.path.display());
        }

        let list = TaskList::new(title.trim());
        self.save(&list)?;
        Ok(list)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PositionId, StableId, Task, TaskStatus};
    use tempfile::TempDir;

    fn sample_list() -> TaskList {
        let mut list = TaskList::new("Plan");
        list.insert(None, None, Task::new(PositionId::root(1), "First"));
        list.insert(None, None, Task::new(PositionId::root(1), "Second"));
        let first = PositionId::root(1);
        list.find_mut(&first).unwrap().status = TaskStatus::InProgress;
        list.ensure_stable_id(&first).unwrap();
        list
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("tasks.md"));

        let list = sample_list();
        store.save(&list).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.title, "Plan");
        assert_eq!(loaded.tasks, list.tasks);
        assert_eq!(
            loaded.front_matter.last_id,
            Some("0000001".parse::<StableId>().unwrap())
        );
        assert!(!dir.path().join("tasks.md.tmp").exists());
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("tasks.md"));

        let list = store.create("  Fresh  ").unwrap();
        assert_eq!(list.title, "Fresh");
        assert!(store.exists());
        assert!(store.create("Again").is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("nested").join("plan.md"));

        store.save(&TaskList::new("Nested")).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn load_missing_file_fails_with_path() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("missing.md"));

        let err = store.load().unwrap_err();
        assert!(format!("{:#}", err).contains("missing.md"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.md");
        fs::write(&path, "# Broken\n\n- [?] 1. Bad\n").unwrap();

        let err = DocumentStore::new(&path).load().unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Failed to parse task list"));
        assert!(message.contains("line 3"));
    }

    #[cfg(unix)]
    #[test]
    fn save_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.md");
        let store = DocumentStore::new(&path);
        store.save(&TaskList::new("Plan")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        store.save(&sample_list()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
