//! Configuration handling for tasklist
//!
//! Configuration is stored in `.tasklist.toml` (project, found by walking up
//! from the current directory) and `<config dir>/tasklist/config.toml`
//! (global). Project values win over global ones.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Limits;

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = ".tasklist.toml";

/// Task list used when a command names no file
pub const DEFAULT_TASK_FILE: &str = "tasks.md";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Settings for the `batch` command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Largest number of operations accepted in one request
    pub max_operations: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_operations: 100,
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Task list used when no file is given, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_file: Option<PathBuf>,

    pub batch: BatchConfig,

    pub limits: Limits,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Task list used when neither the command nor the project names one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_file: Option<PathBuf>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let project_root = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::find_project_root(&cwd));

        if let Some(root) = project_root {
            return Self::for_project(&root);
        }

        Ok(Self {
            project: ProjectConfig::default(),
            global: Self::load_global()?,
            project_root: None,
        })
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        let config = Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "tasklist", "tasklist").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(PROJECT_CONFIG_FILE);

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")
    }

    fn validate(&self) -> Result<()> {
        let limits = &self.project.limits;
        if self.project.batch.max_operations == 0 {
            return Err(ConfigError::Invalid("batch.max_operations must be at least 1".into()).into());
        }
        if limits.max_tasks == 0 || limits.max_depth == 0 {
            return Err(
                ConfigError::Invalid("limits.max_tasks and limits.max_depth must be at least 1".into())
                    .into(),
            );
        }
        Ok(())
    }

    /// Finds the nearest directory at or above `start` holding a project config
    pub fn find_project_root(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(PROJECT_CONFIG_FILE).is_file() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns true if a project config was found
    pub fn is_in_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// The task list to use when a command names none
    ///
    /// A project default is resolved against the project root.
    pub fn default_file(&self) -> PathBuf {
        if let Some(file) = &self.project.default_file {
            return match &self.project_root {
                Some(root) if file.is_relative() => root.join(file),
                _ => file.clone(),
            };
        }
        self.global
            .default_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TASK_FILE))
    }

    /// Resolves an optional command-line file argument
    pub fn task_file(&self, file: Option<&Path>) -> PathBuf {
        file.map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_file())
    }

    pub fn limits(&self) -> Limits {
        self.project.limits
    }

    pub fn max_operations(&self) -> usize {
        self.project.batch.max_operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();

        assert_eq!(config.max_operations(), 100);
        assert_eq!(config.limits(), Limits::default());
        assert_eq!(config.limits().max_tasks, 10_000);
        assert_eq!(config.limits().max_depth, 10);
        assert_eq!(config.global.default_format, OutputFormat::Text);
        assert_eq!(config.default_file(), PathBuf::from("tasks.md"));
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
default_file = "plan/tasks.md"

[batch]
max_operations = 25

[limits]
max_depth = 4
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_file, Some(PathBuf::from("plan/tasks.md")));
        assert_eq!(config.batch.max_operations, 25);
        assert_eq!(config.limits.max_depth, 4);
        assert_eq!(config.limits.max_tasks, 10_000);
    }

    #[test]
    fn parse_global_config() {
        let toml = r#"
default_format = "json"
default_file = "todo.md"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
        assert_eq!(config.default_file, Some(PathBuf::from("todo.md")));
    }

    #[test]
    fn project_default_file_wins_and_is_rooted() {
        let config = Config {
            project: ProjectConfig {
                default_file: Some(PathBuf::from("plan.md")),
                ..ProjectConfig::default()
            },
            global: GlobalConfig {
                default_file: Some(PathBuf::from("global.md")),
                ..GlobalConfig::default()
            },
            project_root: Some(PathBuf::from("/work/repo")),
        };

        assert_eq!(config.default_file(), PathBuf::from("/work/repo/plan.md"));
        assert_eq!(
            config.task_file(Some(Path::new("other.md"))),
            PathBuf::from("other.md")
        );
    }

    #[test]
    fn find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PROJECT_CONFIG_FILE), "").unwrap();

        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        let root = Config::find_project_root(&sub_dir);
        assert_eq!(root.as_deref(), Some(dir.path()));
    }

    #[test]
    fn for_project_reads_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[limits]\nmax_tasks = 50\n",
        )
        .unwrap();

        let config = Config::for_project(dir.path()).unwrap();
        assert!(config.is_in_project());
        assert_eq!(config.limits().max_tasks, 50);
    }

    #[test]
    fn invalid_limits_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[batch]\nmax_operations = 0\n",
        )
        .unwrap();

        assert!(Config::for_project(dir.path()).is_err());
    }
}
