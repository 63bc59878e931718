//! State Store Port - Interface for persisting the shared overlay state.
//!
//! Only the latest snapshot is kept. It is loaded once at startup and
//! overwritten after every accepted update.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::relay::SharedState;

/// Errors that can occur during state store operations
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("No persisted state at {0}")]
    NotFound(PathBuf),

    #[error("Failed to serialize state: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize state: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Port for loading and saving the shared state snapshot
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted snapshot.
    async fn load(&self) -> Result<SharedState, StateStoreError>;

    /// Overwrite the persisted snapshot with `state`.
    async fn save(&self, state: &SharedState) -> Result<(), StateStoreError>;

    /// Load the persisted snapshot, falling back to an empty state.
    ///
    /// A missing or unreadable snapshot is a recoverable condition at
    /// startup, never an error.
    async fn load_or_default(&self) -> SharedState {
        match self.load().await {
            Ok(state) => {
                tracing::info!(keys = state.len(), "Loaded persisted overlay state");
                state
            }
            Err(StateStoreError::NotFound(path)) => {
                tracing::info!(path = %path.display(), "No persisted overlay state, starting empty");
                SharedState::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load persisted overlay state, starting empty");
                SharedState::new()
            }
        }
    }
}
