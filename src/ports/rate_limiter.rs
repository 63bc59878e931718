//! Rate limiting port for protecting the relay from chatty clients.
//!
//! This port defines the interface for per-identity message budgets. The
//! limiter only reports; closing an abusive connection is the caller's job.

use std::time::Duration;

use async_trait::async_trait;

/// Port for rate limiting operations.
///
/// Implementations should be thread-safe and support concurrent access.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record one message from `identity` and decide whether it is allowed.
    ///
    /// The message that exceeds the budget is itself counted and denied.
    async fn check(&self, identity: &str) -> RateLimitResult;

    /// Current usage for `identity` without consuming budget.
    async fn status(&self, identity: &str) -> RateLimitStatus;

    /// Record one message and return whether it is within budget.
    async fn allow(&self, identity: &str) -> bool {
        self.check(identity).await.is_allowed()
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Message is allowed; includes current status.
    Allowed(RateLimitStatus),
    /// Message is denied; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    /// Returns true if the message was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    /// Returns true if the message was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Maximum messages allowed in the window.
    pub limit: u32,
    /// Remaining messages in the current window.
    pub remaining: u32,
    /// Time until the current window can be reset.
    pub resets_in: Duration,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDenied {
    /// Maximum messages allowed in the window.
    pub limit: u32,
    /// Messages counted in the current window, including this one.
    pub count: u32,
    /// Time until the current window can be reset.
    pub retry_after: Duration,
}
