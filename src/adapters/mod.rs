//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the relay engine to the outside world:
//! - `http` - Health probe
//! - `rate_limiter` - Fixed-window limiter
//! - `storage` - Snapshot persistence (file, in-memory)
//! - `websocket` - Upgrade handler and connection registry

pub mod http;
pub mod rate_limiter;
pub mod storage;
pub mod websocket;

pub use rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
pub use storage::{FileStateStore, InMemoryStateStore};
pub use websocket::InMemoryConnectionRegistry;
