use serde::{Deserialize, Serialize};

/// Reconnect delay policy. The default reproduces a fixed one-second sleep with no cap on attempts.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_delay_ms: 1_000,
            max_delay_ms: 1_000,
            multiplier: 1.0,
            jitter: false,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Capped exponential backoff with jitter.
    pub fn exponential(initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        RetryPolicy {
            initial_delay_ms,
            max_delay_ms,
            multiplier: 2.0,
            jitter: true,
            max_attempts: None,
        }
    }
}
