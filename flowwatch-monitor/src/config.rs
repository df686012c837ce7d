//! Monitor configuration
//!
//! Timing parameters for polling and notifications.

use std::time::Duration;

/// Default time between two polls of a running workflow
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Default time a notification stays visible
pub const DEFAULT_NOTIFICATION_LIFETIME: Duration = Duration::from_millis(10_000);

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// How often a running workflow is re-fetched
    pub poll_interval: Duration,

    /// How long a notification lives before it expires on its own
    pub notification_lifetime: Duration,
}

impl MonitorConfig {
    pub fn new(poll_interval: Duration, notification_lifetime: Duration) -> Self {
        Self {
            poll_interval,
            notification_lifetime,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_notification_lifetime(mut self, lifetime: Duration) -> Self {
        self.notification_lifetime = lifetime;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.notification_lifetime.is_zero() {
            anyhow::bail!("notification_lifetime must be greater than 0");
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_NOTIFICATION_LIFETIME)
    }
}
