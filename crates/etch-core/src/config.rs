//! Sync timing configuration.

use std::time::Duration;

/// Timing knobs for catch-up and snapshot responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Timeout for the first state request
    pub initial_request_timeout: Duration,
    /// Multiplier applied to the timeout after each unanswered request
    pub backoff_factor: u32,
    /// Total number of state requests before assuming empty remote state
    pub max_request_attempts: u32,
    /// Upper bound of the random delay before answering a state request
    pub max_response_jitter: Duration,
}

impl SyncConfig {
    /// Timeout armed after the given 1-based request attempt.
    pub fn request_timeout(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_factor.saturating_pow(exponent);
        self.initial_request_timeout.saturating_mul(factor)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_request_timeout: Duration::from_millis(3000),
            backoff_factor: 2,
            max_request_attempts: 3,
            max_response_jitter: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_schedule() {
        let config = SyncConfig::default();
        assert_eq!(config.request_timeout(1), Duration::from_millis(3000));
        assert_eq!(config.request_timeout(2), Duration::from_millis(6000));
        assert_eq!(config.request_timeout(3), Duration::from_millis(12000));
    }

    #[test]
    fn backoff_saturates() {
        let config =
            SyncConfig { initial_request_timeout: Duration::MAX / 2, ..Default::default() };
        assert_eq!(config.request_timeout(3), Duration::MAX);
    }
}
