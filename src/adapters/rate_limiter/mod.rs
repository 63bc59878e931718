//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - Fixed-window counters held in process memory
//!
//! ## Usage
//!
//! ```ignore
//! use overlay_relay::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
//!
//! let limiter = InMemoryRateLimiter::new(RateLimitConfig::per_minute(60));
//! if !limiter.allow("203.0.113.7").await {
//!     // close the connection
//! }
//! ```

mod config;
mod in_memory;

pub use config::{RateLimitConfig, DEFAULT_MESSAGES_PER_WINDOW, DEFAULT_WINDOW};
pub use in_memory::InMemoryRateLimiter;
