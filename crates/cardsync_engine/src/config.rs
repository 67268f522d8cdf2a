//! Configuration for the sync engine.

use cardsync_protocol::DEFAULT_PORT;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for syncing one remote resource.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Resource name on the server.
    pub resource: String,
    /// Root of the client cache directories.
    pub cache_root: PathBuf,
    /// Maximum clock-skew-induced timestamp discrepancy before two
    /// timestamps count as different.
    pub grace: Duration,
    /// Whether unforced syncs run once a baseline exists.
    pub auto_sync: bool,
    /// Retry behavior when another writer races a sync attempt.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration for one `(host, port, resource)` triple.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        resource: impl Into<String>,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            resource: resource.into(),
            cache_root: cache_root.into(),
            grace: Duration::from_millis(2000),
            auto_sync: true,
            retry: RetryConfig::default(),
        }
    }

    /// Creates a configuration with the default port.
    pub fn for_resource(
        host: impl Into<String>,
        resource: impl Into<String>,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        Self::new(host, DEFAULT_PORT, resource, cache_root)
    }

    /// Sets the grace tolerance.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Enables or disables automatic (unforced) syncing.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the grace tolerance in milliseconds.
    pub fn grace_millis(&self) -> i64 {
        self.grace.as_millis() as i64
    }
}

/// Configuration for retry behavior on race detection.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of sync attempts.
    pub max_attempts: u32,
    /// Initial delay between attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::for_resource("localhost", "addresses", "/tmp/cache");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.grace_millis(), 2000);
        assert!(config.auto_sync);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let retry = RetryConfig::new(10)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));

        assert_eq!(retry.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(retry.delay_for_attempt(8), Duration::from_millis(350));
    }

    #[test]
    fn no_retry_budget() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }
}
