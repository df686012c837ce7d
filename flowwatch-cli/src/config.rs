//! Configuration module
//!
//! Handles CLI configuration: server URL and monitor timings.

use flowwatch_monitor::MonitorConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the workflow server
    pub server_url: String,

    /// Polling and notification timings
    pub monitor: MonitorConfig,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            anyhow::bail!("server_url must start with http:// or https://");
        }

        self.monitor.validate()
    }
}
