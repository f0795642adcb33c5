//! Configuration service implementation.
//!
//! Loads the notebook configuration from `config.toml`
//! (`~/.config/notebook/config.toml` unless another path is given).

use crate::paths::NotebookPaths;
use notebook_core::config::NotebookConfig;
use notebook_core::error::Result;
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Loads and caches the notebook configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration; `None` until first access or after invalidation.
    config: Arc<RwLock<Option<NotebookConfig>>>,
}

impl ConfigService {
    /// Uses the platform config file.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(NotebookPaths::config_file()?))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the configuration, loading it from disk if not cached.
    pub fn get_config(&self) -> Result<NotebookConfig> {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let loaded = Self::load_from(&self.path)?;

        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    /// Validates and writes `config`, replacing the cached value.
    pub fn save(&self, config: &NotebookConfig) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(config)?;
        let tmp_path = self.path.with_extension("toml.tmp");
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);
        fs::rename(&tmp_path, &self.path)?;

        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(config.clone());
        tracing::info!("[ConfigService] Saved config to {}", self.path.display());
        Ok(())
    }

    /// Reads a config file. A missing or empty file yields the defaults.
    pub fn load_from(path: &Path) -> Result<NotebookConfig> {
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] {} not found, using defaults",
                path.display()
            );
            return Ok(NotebookConfig::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(NotebookConfig::default());
        }

        let config: NotebookConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}
