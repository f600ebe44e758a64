//! Backoff policy for transient completion-service failures.

use serde::{Deserialize, Serialize};

/// Doubling backoff with a hard ceiling on the delay value.
///
/// Attempt 1 sleeps `initial_delay_ms`, attempt 2 twice that, and so on.
/// Once the computed delay would exceed `ceiling_ms` the policy yields
/// `None` and the caller escalates the underlying error instead of
/// retrying.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub ceiling_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 125,
            backoff_factor: 2.0,
            ceiling_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt_ms(&self, attempt: u32) -> Option<u64> {
        if attempt == 0 {
            return Some(0);
        }
        let exponent = (attempt - 1) as i32;
        let delay = (self.initial_delay_ms as f64) * self.backoff_factor.powi(exponent);
        if delay > self.ceiling_ms as f64 {
            return None;
        }
        Some(delay.round() as u64)
    }
}
