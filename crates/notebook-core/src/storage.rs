//! File system collaborator.
//!
//! The notebook never touches the disk directly. Hosts provide an
//! implementation of [`FileSystem`] (native files, a browser bridge, an
//! in-memory fake) and the store talks to it through this trait.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry returned by [`FileSystem::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Last path segment
    pub name: String,
    /// Path relative to the file system root, `/`-separated
    pub path: String,
    pub is_directory: bool,
}

impl FileEntry {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: true,
        }
    }

    /// Dot-prefixed entries such as `.git` or `.ai-notebook`.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// An abstract file store addressed by relative, `/`-separated paths.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Return `NotebookError::NotFound` from `read` and `delete` for missing paths
/// - Create parent directories on `write`
/// - Treat `""` as the root directory in `list`
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Lists the direct children of `dir`.
    async fn list(&self, dir: &str) -> Result<Vec<FileEntry>>;

    /// Reads a whole file as UTF-8 text.
    async fn read(&self, path: &str) -> Result<String>;

    /// Replaces (or creates) a file with `content`.
    async fn write(&self, path: &str, content: &str) -> Result<()>;

    /// Removes a file.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Checks whether a file exists.
    ///
    /// The default implementation probes with `read`; implementations with a
    /// cheaper check should override it.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.read(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
