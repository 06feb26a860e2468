//! Client for the service that physically deletes file data.

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value as JsonValue;

use super::error_chain;
use crate::config::DeletionExecutorConfig;

/// Why a single deletion request did not succeed.
///
/// The `Display` output is what ends up in the report for the file, so
/// every variant renders a self-contained diagnostic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// The executor answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timeout: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, reset, and similar
    #[error("{0}")]
    Transport(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl DispatchError {
    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(error_chain(&err))
        } else {
            Self::Transport(error_chain(&err))
        }
    }

    fn from_body(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(error_chain(&err))
        } else {
            Self::Body(error_chain(&err))
        }
    }
}

/// Anything that can delete a single file by identifier.
///
/// Implementations must tolerate being asked to delete the same file more
/// than once; a file that failed in one run is offered again in the next.
#[async_trait]
pub trait DeletionExecutor: Send + Sync {
    /// Request deletion of one file, returning the executor's acknowledgement.
    async fn delete(&self, file_id: &str) -> Result<JsonValue, DispatchError>;
}

/// Deletion executor reached over HTTP: `DELETE {delete_url}?file_id={id}`.
#[derive(Clone)]
pub struct HttpDeletionExecutor {
    http_client: Client,
    delete_url: String,
}

impl HttpDeletionExecutor {
    pub fn new(http_client: Client, config: &DeletionExecutorConfig) -> Self {
        Self {
            http_client,
            delete_url: config.delete_url(),
        }
    }
}

#[async_trait]
impl DeletionExecutor for HttpDeletionExecutor {
    async fn delete(&self, file_id: &str) -> Result<JsonValue, DispatchError> {
        let response = self
            .http_client
            .delete(&self.delete_url)
            .query(&[("file_id", file_id)])
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(DispatchError::from_send)?;

        let status = response.status();
        let body = response.bytes().await.map_err(DispatchError::from_body)?;

        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(capture_payload(&body))
    }
}

/// Turn an acknowledgement body into the payload recorded for the file.
///
/// The executor already confirmed the deletion with its status code, so a
/// body that is not JSON is kept verbatim as a string rather than turning a
/// completed deletion into a failure. An empty body becomes `null`.
fn capture_payload(body: &[u8]) -> JsonValue {
    if body.iter().all(u8::is_ascii_whitespace) {
        return JsonValue::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(body).into_owned()))
}
