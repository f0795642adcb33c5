//! Path management for notebook configuration and logs.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "notebook";
const PROJECT_DIR: &str = ".ai-notebook";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for notebook_core::NotebookError {
    fn from(err: PathError) -> Self {
        notebook_core::NotebookError::config(err.to_string())
    }
}

/// Well-known locations.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/notebook/          # Config directory
/// ├── config.toml              # NotebookConfig
/// └── logs/                    # Rolling log files
///     └── notebook.log.YYYY-MM-DD
///
/// <project>/.ai-notebook/      # Per-project state
/// └── chats/                   # Chat sessions of that project
/// ```
pub struct NotebookPaths;

impl NotebookPaths {
    /// Returns the configuration directory (e.g. `~/.config/notebook/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to `config.toml`.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn log_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }

    /// Chat directory of a project folder.
    pub fn chats_dir(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join("chats")
    }

    /// Where notes live: the configured directory, else the user's documents.
    pub fn notes_dir(configured: Option<&Path>) -> Result<PathBuf, PathError> {
        match configured {
            Some(dir) => Ok(dir.to_path_buf()),
            None => dirs::document_dir()
                .or_else(dirs::home_dir)
                .map(|dir| dir.join("Notebook"))
                .ok_or(PathError::HomeDirNotFound),
        }
    }
}
