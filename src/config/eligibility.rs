//! Eligibility source configuration.
//!
//! The source is a Supabase project exposing a Postgres function over the
//! PostgREST RPC interface.
//!
//! # Example
//!
//! ```toml
//! [eligibility]
//! url = "https://abcd.supabase.co"
//! api_key = "${SUPABASE_KEY}"
//! function = "get_files_for_deletion"
//! ```

use serde::{Deserialize, Serialize};

use super::{ConfigError, validate_http_url};

/// Connection settings for the metadata store that lists files due for deletion.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EligibilitySourceConfig {
    /// Base URL of the Supabase project (without `/rest/v1`).
    pub url: String,

    /// API key sent as both the `apikey` header and the bearer token.
    pub api_key: String,

    /// Name of the RPC function returning the eligible files.
    #[serde(default = "default_function")]
    pub function: String,
}

// Hand-written so the key never reaches the logs.
impl std::fmt::Debug for EligibilitySourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EligibilitySourceConfig")
            .field("url", &self.url)
            .field("api_key", &"****")
            .field("function", &self.function)
            .finish()
    }
}

fn default_function() -> String {
    "get_files_for_deletion".to_string()
}

impl EligibilitySourceConfig {
    /// Full URL of the RPC endpoint.
    pub fn rpc_url(&self) -> String {
        format!(
            "{}/rest/v1/rpc/{}",
            self.url.trim_end_matches('/'),
            self.function
        )
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("eligibility.url", &self.url)?;
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "eligibility.api_key must not be empty".into(),
            ));
        }
        if self.function.trim().is_empty() || self.function.contains('/') {
            return Err(ConfigError::Validation(format!(
                "eligibility.function '{}' is not a valid function name",
                self.function
            )));
        }
        Ok(())
    }
}
