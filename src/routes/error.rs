use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::services::OrchestratorError;

/// JSON body of an error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// The eligible set could not be fetched, so nothing was dispatched
    EligibilityUnavailable(String),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Eligibility(e) => ApiError::EligibilityUnavailable(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::EligibilityUnavailable(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get files for deletion",
                details,
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                details,
            }),
        )
            .into_response()
    }
}
