use std::time::Duration;
use rand::Rng;
use crate::config::retry::RetryPolicy;

/// Reconnect delay sequence driven by a `RetryPolicy`.
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Backoff { policy, attempt: 0 }
    }

    /// Delay before the next attempt, or `None` once `max_attempts` is used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let exponent = self.attempt.min(63) as i32;
        let scaled = self.policy.initial_delay_ms as f64 * self.policy.multiplier.max(1.0).powi(exponent);
        let capped = scaled.min(self.policy.max_delay_ms.max(self.policy.initial_delay_ms) as f64) as u64;
        self.attempt = self.attempt.saturating_add(1);

        let delay_ms = if self.policy.jitter && capped > 0 {
            rand::thread_rng().gen_range(capped / 2..=capped)
        } else {
            capped
        };
        Some(Duration::from_millis(delay_ms))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
