//! In-memory rate limiter implementation.
//!
//! Uses a fixed-window counter algorithm with an in-memory HashMap keyed
//! by client identity. Windows are never evicted, so memory grows with the
//! number of distinct identities seen.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::ports::{RateLimitDenied, RateLimitResult, RateLimitStatus, RateLimiter};

use super::config::RateLimitConfig;

/// In-memory rate limiter for single-server deployments.
///
/// Each window tracks the count of messages and resets once more than
/// one full window has elapsed since it started.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    /// Rate limit configuration.
    config: RateLimitConfig,
    /// Per-identity window state.
    windows: RwLock<HashMap<String, WindowState>>,
}

/// State for a single rate limit window.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    /// Number of messages in the current window.
    count: u32,
    /// When the current window started.
    window_start: Instant,
}

impl WindowState {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }

    fn resets_in(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.saturating_duration_since(self.window_start))
    }
}

impl InMemoryRateLimiter {
    /// Create a new in-memory rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Create a rate limiter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Number of identities with a window on record.
    pub async fn tracked_identities(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, identity: &str) -> RateLimitResult {
        let limit = self.config.messages_per_window;
        let window = self.config.window;
        let now = Instant::now();

        let mut windows = self.windows.write().await;
        let state = windows
            .entry(identity.to_string())
            .or_insert_with(|| WindowState::fresh(now));

        if state.is_expired(now, window) {
            *state = WindowState::fresh(now);
        }

        // Counted before comparing, so the offending message is itself denied
        state.count = state.count.saturating_add(1);
        let resets_in = state.resets_in(now, window);

        if state.count <= limit {
            RateLimitResult::Allowed(RateLimitStatus {
                limit,
                remaining: limit - state.count,
                resets_in,
            })
        } else {
            RateLimitResult::Denied(RateLimitDenied {
                limit,
                count: state.count,
                retry_after: resets_in,
            })
        }
    }

    async fn status(&self, identity: &str) -> RateLimitStatus {
        let limit = self.config.messages_per_window;
        let window = self.config.window;
        let now = Instant::now();

        let windows = self.windows.read().await;
        let (count, resets_in) = windows
            .get(identity)
            .filter(|state| !state.is_expired(now, window))
            .map(|state| (state.count, state.resets_in(now, window)))
            .unwrap_or((0, window));

        RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(count),
            resets_in,
        }
    }
}
