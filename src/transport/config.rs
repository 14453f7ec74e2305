//! Transport configuration

use std::time::Duration;

/// Per-stream write settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Interval between keep-alive comments
    pub keepalive_interval: Duration,

    /// Upper bound on a single frame write (including flush)
    pub write_timeout: Duration,

    /// Reconnect delay advertised to clients (`retry:` field)
    pub retry: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            retry: None,
        }
    }
}

impl TransportConfig {
    /// Set the keep-alive interval (at least one millisecond)
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Advertise a reconnect delay
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();

        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.write_timeout, Duration::from_secs(10));
        assert!(config.retry.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = TransportConfig::default()
            .keepalive_interval(Duration::from_secs(5))
            .write_timeout(Duration::from_secs(1))
            .retry(Duration::from_millis(1500));

        assert_eq!(config.keepalive_interval, Duration::from_secs(5));
        assert_eq!(config.write_timeout, Duration::from_secs(1));
        assert_eq!(config.retry, Some(Duration::from_millis(1500)));
    }
}
