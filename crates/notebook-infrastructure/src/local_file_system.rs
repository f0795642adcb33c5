//! `FileSystem` backed by a directory on the local disk.

use async_trait::async_trait;
use notebook_core::error::{NotebookError, Result};
use notebook_core::storage::{FileEntry, FileSystem};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Serves relative, `/`-separated paths from below `root`.
///
/// # Directory Structure
///
/// ```text
/// <root>/
/// ├── Project Plan.md
/// ├── research/
/// │   └── Evidence A.md
/// └── .ai-notebook/
///     └── chats/
/// ```
///
/// Writes go to a temporary sibling first and are renamed over the target,
/// so a crash never leaves a half-written session file behind.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a relative path onto the disk, refusing anything that leaves `root`.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(NotebookError::io(format!(
                "path '{}' is outside the notebook root",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    fn temp_path(target: &Path) -> Result<PathBuf> {
        let file_name = target
            .file_name()
            .ok_or_else(|| NotebookError::io(format!("'{}' has no file name", target.display())))?;
        Ok(target.with_file_name(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Turns `NotFound` into the domain error and keeps the path in other messages.
fn map_io(err: std::io::Error, path: &str) -> NotebookError {
    if err.kind() == ErrorKind::NotFound {
        NotebookError::not_found("file", path)
    } else {
        NotebookError::io(format!("{}: {} (kind: {:?})", path, err, err.kind()))
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn list(&self, dir: &str) -> Result<Vec<FileEntry>> {
        let full = self.resolve(dir)?;
        let prefix = dir.trim_matches('/');
        let mut reader = fs::read_dir(&full).await.map_err(|e| map_io(e, dir))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io(e, dir))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            let file_type = entry.file_type().await.map_err(|e| map_io(e, &path))?;
            entries.push(FileEntry {
                name,
                path,
                is_directory: file_type.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).await.map_err(|e| map_io(e, path))
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await.map_err(|e| map_io(e, path))?;
        }

        let tmp_path = Self::temp_path(&full)?;
        let mut tmp_file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| map_io(e, path))?;
        tmp_file
            .write_all(content.as_bytes())
            .await
            .map_err(|e| map_io(e, path))?;
        tmp_file.sync_all().await.map_err(|e| map_io(e, path))?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, &full).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(map_io(e, path));
        }

        tracing::debug!("[LocalFileSystem] Wrote {} ({} bytes)", path, content.len());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).await.map_err(|e| map_io(e, path))?;
        tracing::debug!("[LocalFileSystem] Deleted {}", path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io(e, path)),
        }
    }
}
