//! Retry policy for frame decodes: a fixed attempt ceiling plus the
//! readiness poll interval used while a decode settles.

use std::time::Duration;

use thumbforge_config::ThumbforgeConfig;
use thumbforge_config::defaults::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS};
use tracing::warn;

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total decode attempts, including the first.
    pub max_attempts: u32,
    /// Delay between readiness polls. Polls do not count as attempts.
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ThumbforgeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts().max(1),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn should_retry(&self, attempt_number: u32) -> bool {
        attempt_number < self.max_attempts
    }
}

/// Attempt bookkeeping for one render operation.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Failed attempts so far.
    pub attempt: u32,
    pub last_error: Option<String>,
    pub exhausted: bool,
}

impl RetryState {
    /// Record a failed decode. Returns true when another attempt is allowed.
    pub fn record_failure(&mut self, policy: &RetryPolicy, error: &str) -> bool {
        self.attempt += 1;
        self.last_error = Some(error.to_string());

        if policy.should_retry(self.attempt) {
            warn!(
                attempt = self.attempt,
                max = policy.max_attempts,
                error = %error,
                "Decode failed, will retry with a fresh stream"
            );
            true
        } else {
            self.exhausted = true;
            warn!(attempt = self.attempt, error = %error, "Decode retry policy exhausted");
            false
        }
    }
}
