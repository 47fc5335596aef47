//! Dispatch engine configuration.
//!
//! Configuration can be provided programmatically or loaded from a
//! TOML file (usually a `[pubsub]` slice of the node configuration).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Dispatch engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Max age of an unacknowledged assignment before it is revoked,
    /// in milliseconds.
    #[serde(default = "default_assignment_timeout_ms")]
    pub assignment_timeout_ms: u64,

    /// Period between client poll-hint bursts, in milliseconds.
    #[serde(default = "default_notification_interval_ms")]
    pub notification_interval_ms: u64,

    /// A subscription idle this long is unsubscribed, in milliseconds.
    #[serde(default = "default_inactivity_threshold_ms")]
    pub inactivity_threshold_ms: u64,

    /// Expiration task period, in milliseconds.
    #[serde(default = "default_clean_interval_ms")]
    pub clean_interval_ms: u64,

    /// Upper bound on the dispatch worker's idle sleep, in
    /// milliseconds.
    #[serde(default = "default_wait_max_ms")]
    pub wait_max_ms: u64,

    /// Max items a single dispatch phase processes per iteration
    /// before yielding to the next phase.
    #[serde(default = "default_fairness_cap")]
    pub fairness_cap: usize,
}

// Default value functions
fn default_assignment_timeout_ms() -> u64 {
    20_000
}

fn default_notification_interval_ms() -> u64 {
    500
}

fn default_inactivity_threshold_ms() -> u64 {
    600_000 // 10 minutes
}

fn default_clean_interval_ms() -> u64 {
    15_000
}

fn default_wait_max_ms() -> u64 {
    5_000
}

fn default_fairness_cap() -> usize {
    200
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            assignment_timeout_ms: default_assignment_timeout_ms(),
            notification_interval_ms: default_notification_interval_ms(),
            inactivity_threshold_ms: default_inactivity_threshold_ms(),
            clean_interval_ms: default_clean_interval_ms(),
            wait_max_ms: default_wait_max_ms(),
            fairness_cap: default_fairness_cap(),
        }
    }
}

impl DispatchConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DispatchConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Assignment acknowledgement timeout.
    #[must_use]
    pub fn assignment_timeout(&self) -> Duration {
        Duration::from_millis(self.assignment_timeout_ms)
    }

    /// Client poll-hint period.
    #[must_use]
    pub fn notification_interval(&self) -> Duration {
        Duration::from_millis(self.notification_interval_ms)
    }

    /// Subscription inactivity threshold.
    #[must_use]
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_millis(self.inactivity_threshold_ms)
    }

    /// Expiration task period.
    #[must_use]
    pub fn clean_interval(&self) -> Duration {
        Duration::from_millis(self.clean_interval_ms)
    }

    /// Idle sleep bound for the dispatch worker.
    #[must_use]
    pub fn wait_max(&self) -> Duration {
        Duration::from_millis(self.wait_max_ms)
    }
}
