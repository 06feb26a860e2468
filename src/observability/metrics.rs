//! Prometheus metrics for the deletion worker.
//!
//! Provides metrics for:
//! - Deletion runs by outcome, and how long they take
//! - Individual file deletions by outcome

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &seconds_from_ms(&config.latency_buckets_ms),
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder.install_recorder().map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

#[cfg(feature = "prometheus")]
fn seconds_from_ms(ms_buckets: &[f64]) -> Vec<f64> {
    ms_buckets.iter().map(|ms| ms / 1000.0).collect()
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render the current metrics in the Prometheus text format, if a recorder
/// is installed.
pub fn render() -> Option<String> {
    #[cfg(feature = "prometheus")]
    {
        get_prometheus_handle().map(PrometheusHandle::render)
    }
    #[cfg(not(feature = "prometheus"))]
    {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a completed deletion run.
///
/// # Arguments
/// * `status` - "completed", "empty", "cancelled" or "failed"
/// * `duration_secs` - Wall-clock time of the run
pub fn record_deletion_run(status: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("deletion_runs_total", "status" => status.to_string()).increment(1);
        histogram!("deletion_run_duration_seconds", "status" => status.to_string())
            .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (status, duration_secs);
    }
}

/// Record the outcome of one file deletion.
///
/// # Arguments
/// * `status` - "success", "error" or "skipped"
pub fn record_file_deletion(status: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("deletion_files_total", "status" => status.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = status;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_is_noop() {
        let config = MetricsConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_metrics(&config).is_ok());
        // Recording without a recorder installed must not panic
        record_deletion_run("completed", 0.5);
        record_file_deletion("success");
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_seconds_from_ms() {
        assert_eq!(seconds_from_ms(&[500.0, 1000.0, 2500.0]), vec![0.5, 1.0, 2.5]);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_recorded_series_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            record_deletion_run("completed", 0.25);
            record_file_deletion("success");
            record_file_deletion("success");
            record_file_deletion("error");
        });

        let rendered = handle.render();
        assert!(
            rendered.contains(r#"deletion_runs_total{status="completed"} 1"#),
            "{rendered}"
        );
        assert!(
            rendered.contains(r#"deletion_files_total{status="success"} 2"#),
            "{rendered}"
        );
        assert!(
            rendered.contains(r#"deletion_files_total{status="error"} 1"#),
            "{rendered}"
        );
        assert!(
            rendered.contains("deletion_run_duration_seconds"),
            "{rendered}"
        );
    }
}
