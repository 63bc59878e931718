//! File-based State Store Adapter
//!
//! Stores the shared overlay state as a single pretty-printed JSON file.
//! The file is human-editable and overwritten wholesale on every save.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::relay::SharedState;
use crate::ports::{StateStore, StateStoreError};

/// File-based storage for the shared state snapshot
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store backed by the JSON file at `path`
    ///
    /// # Example
    /// ```ignore
    /// let store = FileStateStore::new("./config.json");
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the persisted snapshot
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the snapshot is written to before being renamed into place
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Ensure the parent directory exists
    async fn ensure_parent_dir(&self) -> Result<(), StateStoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .await
                .map_err(|e| StateStoreError::IoError(e.to_string())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<SharedState, StateStoreError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StateStoreError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(StateStoreError::IoError(e.to_string())),
        };

        serde_json::from_str(&json)
            .map_err(|e| StateStoreError::DeserializationFailed(e.to_string()))
    }

    async fn save(&self, state: &SharedState) -> Result<(), StateStoreError> {
        self.ensure_parent_dir().await?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StateStoreError::SerializationFailed(e.to_string()))?;

        // A crash mid-write leaves the previous snapshot in place
        let staging = self.staging_path();
        fs::write(&staging, json)
            .await
            .map_err(|e| StateStoreError::IoError(e.to_string()))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| StateStoreError::IoError(e.to_string()))?;

        Ok(())
    }
}
