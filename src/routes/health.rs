//! Health check endpoints for supervisors and monitoring.

use axum::{Json, response::IntoResponse};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;

use crate::models::serialize_iso8601;

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always "ok" while the process is serving
    pub status: &'static str,
    #[serde(serialize_with = "serialize_iso8601")]
    pub timestamp: DateTime<Utc>,
}

/// Health check.
///
/// Does not touch the eligibility source or the deletion executor, so it
/// reports on this process only.
#[tracing::instrument(name = "health.check")]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok",
        timestamp: Utc::now(),
    })
}

/// Liveness probe. Returns 200 with an empty body.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
///
/// Returns metrics in Prometheus text format.
#[tracing::instrument(name = "health.metrics")]
pub async fn metrics() -> impl IntoResponse {
    if !cfg!(feature = "prometheus") {
        return (
            StatusCode::NOT_FOUND,
            [("content-type", "text/plain")],
            "Prometheus metrics not enabled".to_string(),
        );
    }

    match crate::observability::metrics::render() {
        Some(metrics) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            metrics,
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}
