//! Registry configuration

use std::time::Duration;

/// What to do when a stream is opened for a uid that already has one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Close the existing stream and register the new one
    Replace,
    /// Keep the existing stream and fail the new open with `AlreadyOpen`
    Reject,
}

/// Configuration for stream and subscription bookkeeping
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Behaviour on a second open for the same uid
    pub duplicate_policy: DuplicatePolicy,

    /// Per-stream delivery queue capacity (events)
    ///
    /// Once a subscriber's queue is full, further events for it are dropped
    /// until the transport catches up.
    pub delivery_queue_capacity: usize,

    /// Reap streams that have not completed a write for this long
    pub idle_timeout: Duration,

    /// Reap subscriptions of uids that never opened a stream after this long
    pub orphan_subscription_ttl: Duration,

    /// How often the cleanup task runs
    pub cleanup_interval: Duration,

    /// Reject subscriptions for uids without an open stream
    pub require_open_stream: bool,

    /// Maximum concurrently open streams (0 = unlimited)
    ///
    /// A reconnect that replaces a uid's own stream never counts against it.
    pub max_streams: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Replace,
            delivery_queue_capacity: 256,
            idle_timeout: Duration::from_secs(90),
            orphan_subscription_ttl: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(15),
            require_open_stream: false,
            max_streams: 0, // Unlimited
        }
    }
}

impl RegistryConfig {
    /// Set the duplicate-uid policy
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the per-stream delivery queue capacity (minimum 1)
    pub fn delivery_queue_capacity(mut self, capacity: usize) -> Self {
        self.delivery_queue_capacity = capacity.max(1);
        self
    }

    /// Set the idle timeout for open streams
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set how long subscriptions may exist without an open stream
    pub fn orphan_subscription_ttl(mut self, ttl: Duration) -> Self {
        self.orphan_subscription_ttl = ttl;
        self
    }

    /// Set the cleanup interval (at least one millisecond)
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Require an open stream before a uid may subscribe
    pub fn require_open_stream(mut self, required: bool) -> Self {
        self.require_open_stream = required;
        self
    }

    /// Set maximum concurrently open streams
    pub fn max_streams(mut self, max: usize) -> Self {
        self.max_streams = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.delivery_queue_capacity, 256);
        assert!(!config.require_open_stream);
        assert_eq!(config.max_streams, 0);
        assert!(config.idle_timeout > config.cleanup_interval);
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = RegistryConfig::default().delivery_queue_capacity(0);

        assert_eq!(config.delivery_queue_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .duplicate_policy(DuplicatePolicy::Reject)
            .idle_timeout(Duration::from_secs(5))
            .orphan_subscription_ttl(Duration::from_secs(2))
            .cleanup_interval(Duration::from_millis(500))
            .require_open_stream(true)
            .max_streams(10);

        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.orphan_subscription_ttl, Duration::from_secs(2));
        assert_eq!(config.cleanup_interval, Duration::from_millis(500));
        assert!(config.require_open_stream);
        assert_eq!(config.max_streams, 10);
    }
}
