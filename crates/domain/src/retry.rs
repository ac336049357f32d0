//! Retry policy: exponential backoff for executions recorded as `RETRY`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error message fragments that make retrying pointless.
const NON_RETRYABLE_FRAGMENTS: [&str; 10] = [
    "authentication",
    "authorization",
    "invalid credentials",
    "access denied",
    "forbidden",
    "validation",
    "invalid request",
    "bad request",
    "not found",
    "does not exist",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "secs")]
    pub base_delay: Duration,
    #[serde(with = "secs")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` previous ones.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Same as [`should_retry`](Self::should_retry), but also refuses when
    /// the failure message points at a permanent error (auth, validation,
    /// missing resource).
    #[must_use]
    pub fn should_retry_error(&self, attempt: u32, message: &str) -> bool {
        let message = message.to_lowercase();
        self.should_retry(attempt)
            && !NON_RETRYABLE_FRAGMENTS
                .iter()
                .any(|fragment| message.contains(fragment))
    }

    /// `base * 2^attempt`, capped at `max_delay`; `None` once attempts are
    /// exhausted.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(
            self.base_delay
                .checked_mul(factor)
                .map_or(self.max_delay, |delay| delay.min(self.max_delay)),
        )
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
