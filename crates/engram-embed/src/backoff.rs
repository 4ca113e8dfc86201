//! Shared exponential backoff policy
//!
//! Every external-call site in the workspace (embedding provider, agent
//! collaborator, web search) retries through this one policy object
//! instead of ad-hoc sleep loops.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy: bounded attempts with exponential backoff and jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Total attempts including the first (1 = no retries)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
    /// Growth factor between attempts
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// A policy that never retries. Useful in tests.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based: the delay taken
    /// after the first failure is `delay_for(0)`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let jitter = (base * 0.1 * deterministic_jitter(attempt)) as u64;
        let delay = (base as u64).saturating_add(jitter);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Sleep for the delay associated with `attempt`.
    pub async fn wait(&self, attempt: u32) {
        tokio::time::sleep(self.delay_for(attempt)).await;
    }
}

/// Deterministic jitter in [0, 1) derived from the attempt number.
/// Keeps retry timing reproducible without pulling in a rand crate.
fn deterministic_jitter(attempt: u32) -> f64 {
    let x = attempt.wrapping_add(1).wrapping_mul(2654435761);
    (x % 100) as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay_ms, 500);
        assert_eq!(policy.max_delay_ms, 30_000);
        assert!((policy.multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn delays_grow_but_respect_max() {
        let policy = BackoffPolicy {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 2_000,
            multiplier: 10.0,
        };
        let first = policy.delay_for(0);
        let late = policy.delay_for(4);
        assert!(first < late || late == Duration::from_millis(2_000));
        assert!(late <= Duration::from_millis(2_000));
    }

    #[test]
    fn jitter_is_deterministic() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1), policy.delay_for(1));
    }
}
