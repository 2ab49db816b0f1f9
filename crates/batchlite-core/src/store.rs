use crate::types::Task;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent storage for a task and its jobs' runtime records.
pub struct TaskStore {
    path: Utf8PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the task file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Load a task from disk.
    pub fn load(&self) -> Result<Task, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save a task to disk.
    ///
    /// Creates parent directories if needed.
    pub fn save(&self, task: &Task) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(task)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
