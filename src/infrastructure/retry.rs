//! Bounded retry policy for remote calls.
//!
//! Plain data consumed by the gateway's call loop. Kept orthogonal to the
//! circuit breaker: the policy bounds attempts within one call, the breaker
//! watches failure streaks across calls.

use std::time::Duration;

use crate::domain::errors::GatewayError;

/// Classified outcome of one call attempt.
#[derive(Debug)]
pub enum CallError {
    /// Client-side rejection; propagated immediately, never retried.
    Fatal(GatewayError),
    /// Anything else: transport failure or a retryable remote status.
    Retryable(String),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pause: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Attempts the gateway will make per call. At least one, whatever the
    /// configured budget.
    pub fn budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
