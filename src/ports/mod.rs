//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay engine and the outside world. Adapters implement these ports.
//!
//! - `StateStore` - Load/save the latest shared state snapshot
//! - `RateLimiter` - Fixed-window message budgets per client identity
//! - `ConnectionRegistry` - Live authenticated sockets and fan-out

mod connection_registry;
mod rate_limiter;
mod state_store;

pub use connection_registry::{
    BroadcastReport, ConnectionRegistry, ConnectionRegistryError, RegisteredConnection,
};
pub use rate_limiter::{RateLimitDenied, RateLimitResult, RateLimitStatus, RateLimiter};
pub use state_store::{StateStore, StateStoreError};
