//! Exponential backoff with jitter for transient invocation failures

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Ceiling on any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Multiplier applied per retry
    pub backoff_multiplier: f64,

    /// Spread delays by up to ±20% to avoid thundering herds
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// A config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before the retry following `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let clamped = base.min(self.max_delay.as_millis() as f64);

        let with_jitter = if self.add_jitter {
            // ±20% spread
            clamped * (1.0 + 0.2 * (2.0 * rand_jitter() - 1.0))
        } else {
            clamped
        };

        Duration::from_millis(with_jitter.max(0.0) as u64)
    }
}

/// Simple pseudo-random value in [0, 1)
///
/// Uses an LCG seeded from a counter and the clock; good enough for
/// jitter, deterministic enough for tests.
fn rand_jitter() -> f64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEED: AtomicU64 = AtomicU64::new(0);

    const A: u64 = 1103515245;
    const C: u64 = 12345;
    const M: u64 = 1 << 31;

    let seed = SEED.fetch_add(1, Ordering::Relaxed);
    let time_component = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let combined = seed.wrapping_add(time_component);
    let next = (A.wrapping_mul(combined).wrapping_add(C)) % M;

    (next as f64) / (M as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_exponentially_without_jitter() {
        let config = RetryConfig {
            add_jitter: false,
            ..Default::default()
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            add_jitter: false,
            max_delay: Duration::from_millis(500),
            ..Default::default()
        };
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_twenty_percent() {
        let config = RetryConfig::default();
        for attempt in 0..50 {
            let delay = config.delay_for_attempt(attempt % 3).as_millis() as f64;
            let base = 200.0 * 2f64.powi((attempt % 3) as i32);
            assert!(delay >= base * 0.8 - 1.0, "delay {} below band", delay);
            assert!(delay <= base * 1.2 + 1.0, "delay {} above band", delay);
        }
    }
}
