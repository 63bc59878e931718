//! Rate limit configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default messages allowed per client per window.
pub const DEFAULT_MESSAGES_PER_WINDOW: u32 = 60;

/// Fixed window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Per-client message budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum messages per client identity per window.
    pub messages_per_window: u32,
    /// Window duration.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Budget of `messages_per_window` over the default 60 second window.
    pub fn per_minute(messages_per_window: u32) -> Self {
        Self {
            messages_per_window,
            window: DEFAULT_WINDOW,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(DEFAULT_MESSAGES_PER_WINDOW)
    }
}
