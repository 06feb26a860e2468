//! Scheduled deletion configuration.
//!
//! # Example
//!
//! ```toml
//! [schedule]
//! enabled = true
//! interval_secs = 900
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Built-in periodic trigger for deletion runs.
///
/// Disabled by default: most deployments trigger runs from an external
/// scheduler through the HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Whether the background worker runs.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between the end of one run and the start of the next.
    /// Default: 3600 (hourly)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

impl ScheduleConfig {
    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "schedule.interval_secs must be greater than 0 when the schedule is enabled"
                    .into(),
            ));
        }
        Ok(())
    }
}
