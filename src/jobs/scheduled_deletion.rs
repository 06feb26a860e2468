//! Periodic deletion worker.
//!
//! Runs the orchestrator on a fixed interval, measured from the end of one
//! run to the start of the next so runs never overlap. Shutdown stops new
//! dispatches in the current run and exits once it has been reported.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{config::ScheduleConfig, services::Orchestrator};

/// Starts the scheduled deletion worker.
///
/// Returns immediately if the schedule is disabled, otherwise runs until
/// `shutdown` is cancelled.
pub async fn start_deletion_worker(
    orchestrator: Arc<Orchestrator>,
    config: ScheduleConfig,
    shutdown: CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Scheduled deletion worker disabled by configuration");
        return;
    }

    tracing::info!(
        interval_secs = config.interval_secs,
        "Starting scheduled deletion worker"
    );

    let interval = config.interval();

    loop {
        match orchestrator.run_until_cancelled(shutdown.child_token()).await {
            Ok(report) => {
                if report.total() > 0 {
                    tracing::info!(
                        deleted = report.deleted_files.len(),
                        failed = report.errors.len(),
                        cancelled = report.cancelled,
                        "Scheduled deletion run complete"
                    );
                } else {
                    tracing::debug!("Scheduled deletion run complete, nothing to delete");
                }
            }
            Err(e) => {
                // The next tick retries; the source is the only thing that can fail a run
                tracing::error!(error = %e, "Error running scheduled deletion");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Scheduled deletion worker stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
