//! Client for the metadata store that lists files due for deletion.
//!
//! The store is a Supabase project. Eligibility is decided entirely by a
//! Postgres function called over the PostgREST RPC interface; this client
//! only invokes it and interprets the response envelope.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{config::EligibilitySourceConfig, models::EligibleFile};

/// Error type for eligibility source operations.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Eligibility source returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The RPC ran but reported failure in its envelope
    #[error("{0}")]
    Api(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Anything that can produce the set of files to delete.
#[async_trait]
pub trait EligibilitySource: Send + Sync {
    /// Fetch the files currently eligible for deletion.
    ///
    /// An empty set is a normal result, not an error.
    async fn fetch_eligible(&self) -> Result<Vec<EligibleFile>, EligibilityError>;
}

/// Envelope returned by the eligibility RPC.
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Vec<EligibleFile>>,
    #[serde(default)]
    error: Option<String>,
}

/// Error body PostgREST sends on non-2xx responses.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
}

/// Eligibility source backed by a Supabase RPC function.
#[derive(Clone)]
pub struct SupabaseEligibilitySource {
    http_client: Client,
    rpc_url: String,
    api_key: String,
}

impl SupabaseEligibilitySource {
    pub fn new(http_client: Client, config: &EligibilitySourceConfig) -> Self {
        Self {
            http_client,
            rpc_url: config.rpc_url(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl EligibilitySource for SupabaseEligibilitySource {
    #[tracing::instrument(name = "eligibility.fetch", skip(self), fields(url = %self.rpc_url))]
    async fn fetch_eligible(&self) -> Result<Vec<EligibleFile>, EligibilityError> {
        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<PostgrestError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(EligibilityError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_envelope(&body)
    }
}

fn parse_envelope(body: &str) -> Result<Vec<EligibleFile>, EligibilityError> {
    // A function returning NULL comes back as an empty or `null` body
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let envelope: Option<RpcEnvelope> = serde_json::from_str(body)
        .map_err(|e| EligibilityError::InvalidResponse(e.to_string()))?;
    let Some(envelope) = envelope else {
        return Ok(Vec::new());
    };

    let failed = match envelope.success {
        Some(success) => !success,
        None => envelope.error.is_some(),
    };
    if failed {
        return Err(EligibilityError::Api(
            envelope
                .error
                .unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }

    Ok(envelope.data.unwrap_or_default())
}
