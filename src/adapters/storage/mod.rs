//! Storage Adapters
//!
//! Implementations of the StateStore port for persisting the shared state.
//!
//! ## Available Adapters
//!
//! - **FileStateStore** - Stores the snapshot as a pretty-printed JSON file
//! - **InMemoryStateStore** - Stores the snapshot in memory (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileStateStore, InMemoryStateStore};
//!
//! // Production: file-based storage
//! let store = FileStateStore::new("./config.json");
//!
//! // Testing: in-memory storage
//! let store = InMemoryStateStore::new();
//! ```

mod file_state_store;
mod in_memory_state_store;

pub use file_state_store::FileStateStore;
pub use in_memory_state_store::InMemoryStateStore;
