//! Configuration module for the deletion worker.
//!
//! The worker is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` and `${VAR_NAME:-default}` syntax.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [eligibility]
//! url = "${SUPABASE_URL}"
//! api_key = "${SUPABASE_KEY}"
//!
//! [executor]
//! base_url = "${BALANCER_URL}"
//! ```

mod eligibility;
mod executor;
mod observability;
mod schedule;
mod server;

use std::{path::Path, sync::LazyLock};

pub use eligibility::*;
pub use executor::*;
pub use observability::*;
use regex::Regex;
pub use schedule::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the deletion worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Metadata store that enumerates files due for deletion.
    pub eligibility: EligibilitySourceConfig,

    /// Service that physically deletes file data.
    pub executor: DeletionExecutorConfig,

    /// Built-in periodic trigger.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl WorkerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: WorkerConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    ///
    /// Runs at load time so a worker with missing endpoints refuses to start
    /// instead of failing every run.
    fn validate(&self) -> Result<(), ConfigError> {
        self.eligibility.validate()?;
        self.executor.validate()?;
        self.schedule.validate()?;
        self.observability.metrics.validate()?;
        Ok(())
    }
}

/// Default configuration used when no config file is given.
///
/// Reads the same environment variables the worker has always been deployed
/// with, so a `.env` file alone is enough to run it.
pub fn default_config_toml() -> &'static str {
    r#"# Deletion worker configuration (built-in default)

[server]
host = "0.0.0.0"
port = ${PORT:-8080}

[eligibility]
url = "${SUPABASE_URL}"
api_key = "${SUPABASE_KEY}"

[executor]
base_url = "${BALANCER_URL}"
"#
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid env var regex")
});

/// Expand environment variables in the format `${VAR_NAME}` or `${VAR_NAME:-default}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_RE.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = match (std::env::var(var_name), cap.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
            };
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

/// Check that a configured endpoint is an absolute http(s) URL.
pub(crate) fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} must not be empty")));
    }
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}
