//! Deletion trigger endpoint.

use axum::{Json, extract::State};

use super::error::ApiError;
use crate::{AppState, models::DeletionReport};

/// Run one deletion pass and return its report.
///
/// Responds 200 with the report even when individual files failed; only a
/// failure to fetch the eligible set produces an error response. Shutdown
/// stops the run from dispatching further files.
#[tracing::instrument(name = "deletion.trigger", skip(state))]
pub async fn trigger_deletion(
    State(state): State<AppState>,
) -> Result<Json<DeletionReport>, ApiError> {
    let report = state
        .orchestrator
        .run_until_cancelled(state.shutdown.child_token())
        .await?;
    Ok(Json(report))
}
