//! Notebook configuration.
//!
//! Loaded from `config.toml` by the infrastructure layer; every field has a
//! default so an empty or missing file is a valid configuration.

use crate::error::{NotebookError, Result};
use crate::session::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, read from `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NotebookConfig {
    /// Directory holding notes and chats. `None` lets the host decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_dir: Option<PathBuf>,
    /// Extension of session files, without the dot
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Model recorded on newly created chats
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Temperature recorded on newly created chats
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    /// Whether dot-prefixed files and directories are loaded
    #[serde(default)]
    pub include_hidden: bool,
}

fn default_file_extension() -> String {
    "md".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            notes_dir: None,
            file_extension: default_file_extension(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            include_hidden: false,
        }
    }
}

impl NotebookConfig {
    /// Rejects values the store cannot work with.
    pub fn validate(&self) -> Result<()> {
        let extension = self.file_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(NotebookError::config(format!(
                "invalid file_extension '{}'",
                self.file_extension
            )));
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(NotebookError::config(format!(
                "default_temperature {} is outside [0.0, 2.0]",
                self.default_temperature
            )));
        }
        Ok(())
    }

    /// The extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.file_extension.trim_start_matches('.')
    }

    /// Turns a display name into a session file id, e.g. `Plan` -> `Plan.md`.
    ///
    /// A name that already carries the extension is left as is.
    pub fn file_name_for(&self, name: &str) -> String {
        let suffix = format!(".{}", self.extension());
        if name.to_lowercase().ends_with(&suffix.to_lowercase()) {
            name.to_string()
        } else {
            format!("{}{}", name, suffix)
        }
    }

    /// Whether `path` names a session file.
    pub fn is_session_file(&self, path: &str) -> bool {
        let suffix = format!(".{}", self.extension()).to_lowercase();
        path.to_lowercase().ends_with(&suffix)
    }
}
