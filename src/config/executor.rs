//! Deletion executor configuration.
//!
//! # Example
//!
//! ```toml
//! [executor]
//! base_url = "http://balancer:9000"
//! delete_path = "/delete"
//! concurrency = 4
//! run_timeout_secs = 600
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, validate_http_url};

/// Settings for the service that performs the physical deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletionExecutorConfig {
    /// Base URL of the deletion service.
    pub base_url: String,

    /// Path of the deletion endpoint, appended to `base_url`.
    /// Default: "/delete"
    #[serde(default = "default_delete_path")]
    pub delete_path: String,

    /// Maximum number of deletion requests in flight during one run.
    /// 1 processes files strictly one after another.
    /// Default: 1
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for a whole run in seconds. When it passes, no new deletions
    /// are dispatched and the run reports what completed so far.
    /// Set to 0 for no deadline.
    /// Default: 0
    #[serde(default)]
    pub run_timeout_secs: u64,
}

fn default_delete_path() -> String {
    "/delete".to_string()
}

fn default_concurrency() -> usize {
    1
}

impl DeletionExecutorConfig {
    /// Full URL of the deletion endpoint, without the query string.
    pub fn delete_url(&self) -> String {
        let path = self.delete_path.trim_start_matches('/');
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Get the run deadline as a Duration, if one is configured.
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("executor.base_url", &self.base_url)?;
        if self.concurrency == 0 {
            return Err(ConfigError::Validation(
                "executor.concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
