//! In-Memory State Store Adapter
//!
//! Keeps the snapshot in memory. Useful for testing and development.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::relay::SharedState;
use crate::ports::{StateStore, StateStoreError};

/// In-memory storage for the shared state snapshot
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    snapshot: Arc<RwLock<Option<SharedState>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `state`
    pub fn with_state(state: SharedState) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Some(state))),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail with an IO error (useful for tests)
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last saved snapshot, if any
    pub async fn snapshot(&self) -> Option<SharedState> {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> Result<SharedState, StateStoreError> {
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or_else(|| StateStoreError::NotFound(PathBuf::from(":memory:")))
    }

    async fn save(&self, state: &SharedState) -> Result<(), StateStoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StateStoreError::IoError("simulated write failure".to_string()));
        }
        *self.snapshot.write().await = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
