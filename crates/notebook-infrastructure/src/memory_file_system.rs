//! In-memory `FileSystem`, used by tests and by hosts without a disk.

use async_trait::async_trait;
use notebook_core::error::{NotebookError, Result};
use notebook_core::storage::{FileEntry, FileSystem};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Files keyed by their relative path. Directories exist implicitly as
/// prefixes of stored paths.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with `(path, content)` pairs.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(p, c)| {
                let path: String = p.into();
                (normalize(&path), c.into())
            })
            .collect();
        Self {
            files: RwLock::new(files),
        }
    }

    /// Snapshot of every stored path.
    pub async fn paths(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn list(&self, dir: &str) -> Result<Vec<FileEntry>> {
        let dir = normalize(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let files = self.files.read().await;
        let mut names_seen = BTreeSet::new();
        let mut entries = Vec::new();
        for path in files.keys().filter(|p| p.starts_with(&prefix)) {
            let rest = &path[prefix.len()..];
            let (name, is_directory) = match rest.split_once('/') {
                Some((head, _)) => (head, true),
                None => (rest, false),
            };
            if names_seen.insert(name.to_string()) {
                let full = format!("{}{}", prefix, name);
                entries.push(if is_directory {
                    FileEntry::directory(name, full)
                } else {
                    FileEntry::file(name, full)
                });
            }
        }

        if entries.is_empty() && !dir.is_empty() {
            return Err(NotebookError::not_found("directory", dir));
        }
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let path = normalize(path);
        self.files
            .read()
            .await
            .get(&path)
            .cloned()
            .ok_or_else(|| NotebookError::not_found("file", path))
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        self.files
            .write()
            .await
            .insert(normalize(path), content.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        match self.files.write().await.remove(&path) {
            Some(_) => Ok(()),
            None => Err(NotebookError::not_found("file", path)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.read().await.contains_key(&normalize(path)))
    }
}
