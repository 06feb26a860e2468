//! Deletion worker.
//!
//! Fetches the files a metadata store has marked for deletion, asks the
//! storage-owning service to delete each one, and reports a per-file outcome.
//! Runs are triggered over HTTP (`POST /delete`), by the optional built-in
//! schedule, or once from the command line.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod config;
pub mod jobs;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;

#[cfg(test)]
mod tests;

use config::WorkerConfig;
use services::Orchestrator;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Background tasks awaited on shutdown
    pub task_tracker: TaskTracker,
    /// Cancelled on shutdown; runs stop dispatching new deletions
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build the state for the HTTP-backed source and executor in `config`.
    pub fn new(config: &WorkerConfig) -> Result<Self, reqwest::Error> {
        let http_client = config.server.http_client.build_client()?;
        Ok(Self::with_orchestrator(Orchestrator::from_config(
            config,
            http_client,
        )))
    }

    pub fn with_orchestrator(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the HTTP application.
pub fn build_app(config: &WorkerConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/delete", post(routes::deletions::trigger_deletion));

    if config.observability.metrics.enabled {
        app = app.route(
            &config.observability.metrics.path,
            get(routes::health::metrics),
        );
    }

    app.layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
