//! One deletion run: fetch the eligible set, dispatch a deletion per file,
//! and fold the outcomes into a [`DeletionReport`].
//!
//! A failure to fetch the eligible set fails the whole run and nothing is
//! dispatched. Once the set is known, every file gets exactly one outcome:
//! a failure for one file never stops the others, and the report lists
//! files in the order the source returned them regardless of how many
//! requests run concurrently.

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{
    DeletionExecutor, EligibilityError, EligibilitySource, HttpDeletionExecutor,
    SupabaseEligibilitySource,
};
use crate::{
    config::WorkerConfig,
    models::{DeletionOutcome, DeletionReport, EligibleFile},
    observability::metrics,
};

/// Diagnostic recorded for files the run never got to.
pub const CANCELLED_BEFORE_DISPATCH: &str = "cancelled before dispatch";

/// Error that fails a run as a whole.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Failed to get files for deletion: {0}")]
    Eligibility(#[from] EligibilityError),
}

/// Drives deletion runs against an eligibility source and a deletion executor.
pub struct Orchestrator {
    source: Arc<dyn EligibilitySource>,
    executor: Arc<dyn DeletionExecutor>,
    concurrency: usize,
    run_timeout: Option<Duration>,
}

enum Dispatch {
    Sent(DeletionOutcome),
    Skipped(DeletionOutcome),
}

impl Orchestrator {
    /// Create an orchestrator that processes files one at a time with no
    /// run deadline.
    pub fn new(source: Arc<dyn EligibilitySource>, executor: Arc<dyn DeletionExecutor>) -> Self {
        Self {
            source,
            executor,
            concurrency: 1,
            run_timeout: None,
        }
    }

    /// Build the HTTP-backed orchestrator described by the configuration.
    pub fn from_config(config: &WorkerConfig, http_client: reqwest::Client) -> Self {
        let source = SupabaseEligibilitySource::new(http_client.clone(), &config.eligibility);
        let executor = HttpDeletionExecutor::new(http_client, &config.executor);
        Self::new(Arc::new(source), Arc::new(executor))
            .with_concurrency(config.executor.concurrency)
            .with_run_timeout(config.executor.run_timeout())
    }

    /// Maximum number of deletion requests in flight at once (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop dispatching new deletions once this much time has passed.
    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Execute one deletion run to completion.
    pub async fn run(&self) -> Result<DeletionReport, OrchestratorError> {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Execute one deletion run, dispatching no new deletions after `cancel`
    /// fires or the run deadline passes.
    ///
    /// Requests already in flight are allowed to finish. Files never
    /// dispatched are reported as errors and the report is marked cancelled.
    #[tracing::instrument(name = "deletion.run", skip_all)]
    pub async fn run_until_cancelled(
        &self,
        cancel: CancellationToken,
    ) -> Result<DeletionReport, OrchestratorError> {
        let start = std::time::Instant::now();
        tracing::info!("Starting deletion run");

        let files = match self.source.fetch_eligible().await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get files for deletion");
                metrics::record_deletion_run("failed", start.elapsed().as_secs_f64());
                return Err(e.into());
            }
        };

        if files.is_empty() {
            tracing::info!("No files to delete");
            metrics::record_deletion_run("empty", start.elapsed().as_secs_f64());
            return Ok(DeletionReport::empty());
        }

        tracing::info!(
            count = files.len(),
            concurrency = self.concurrency,
            "Found files for deletion"
        );

        let deadline = self.run_timeout.map(|t| Instant::now() + t);
        let cancel = &cancel;
        let results: Vec<Dispatch> = stream::iter(files)
            .map(move |file| self.dispatch(file, cancel, deadline))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut dispatched = 0;
        let outcomes: Vec<DeletionOutcome> = results
            .into_iter()
            .map(|result| match result {
                Dispatch::Sent(outcome) => {
                    dispatched += 1;
                    outcome
                }
                Dispatch::Skipped(outcome) => outcome,
            })
            .collect();

        let report = DeletionReport::from_outcomes(outcomes, dispatched);
        let status = if report.cancelled {
            "cancelled"
        } else {
            "completed"
        };
        metrics::record_deletion_run(status, start.elapsed().as_secs_f64());

        tracing::info!(
            deleted = report.deleted_files.len(),
            failed = report.errors.len(),
            cancelled = report.cancelled,
            duration_ms = start.elapsed().as_millis() as u64,
            "{}",
            report.message
        );

        Ok(report)
    }

    async fn dispatch(
        &self,
        file: EligibleFile,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Dispatch {
        let expired = deadline.is_some_and(|d| Instant::now() >= d);
        if cancel.is_cancelled() || expired {
            tracing::warn!(file_id = %file.file_id, "Run stopped, skipping deletion");
            metrics::record_file_deletion("skipped");
            return Dispatch::Skipped(DeletionOutcome::failure(
                file.file_id,
                CANCELLED_BEFORE_DISPATCH,
            ));
        }

        tracing::debug!(
            file_id = %file.file_id,
            file_name = %file.file_name,
            server_id = %file.server_id,
            size = file.size,
            "Deleting file"
        );

        // Run each request as its own task so a panicking executor only
        // costs the file it was handling.
        let executor = Arc::clone(&self.executor);
        let file_id = file.file_id.clone();
        let task = tokio::spawn(async move { executor.delete(&file_id).await });

        let outcome = match task.await {
            Ok(Ok(payload)) => {
                tracing::info!(file_id = %file.file_id, "Successfully deleted file");
                DeletionOutcome::success(file.file_id, payload)
            }
            Ok(Err(e)) => {
                tracing::error!(file_id = %file.file_id, error = %e, "Failed to delete file");
                DeletionOutcome::failure(file.file_id, e.to_string())
            }
            Err(e) => {
                tracing::error!(file_id = %file.file_id, error = %e, "Deletion task failed");
                DeletionOutcome::failure(file.file_id, format!("deletion task failed: {e}"))
            }
        };
        metrics::record_file_deletion(&outcome.status.to_string());

        Dispatch::Sent(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use rstest::rstest;
    use serde_json::{Value as JsonValue, json};

    use super::*;
    use crate::{models::OutcomeStatus, services::DispatchError};

    struct StaticSource {
        files: Result<Vec<EligibleFile>, String>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn with_ids(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                files: Ok(ids.iter().map(|id| EligibleFile::with_id(*id)).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                files: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EligibilitySource for StaticSource {
        async fn fetch_eligible(&self) -> Result<Vec<EligibleFile>, EligibilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files.clone().map_err(EligibilityError::Api)
        }
    }

    #[derive(Clone)]
    enum Behavior {
        Ack(JsonValue),
        Fail(DispatchError),
        Panic,
    }

    /// Executor answering from a per-file script, optionally after a delay.
    #[derive(Default)]
    struct ScriptedExecutor {
        script: HashMap<String, (Duration, Behavior)>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn on(mut self, file_id: &str, behavior: Behavior) -> Self {
            self.script
                .insert(file_id.to_string(), (Duration::ZERO, behavior));
            self
        }

        fn on_after(mut self, file_id: &str, delay: Duration, behavior: Behavior) -> Self {
            self.script.insert(file_id.to_string(), (delay, behavior));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeletionExecutor for ScriptedExecutor {
        async fn delete(&self, file_id: &str) -> Result<JsonValue, DispatchError> {
            self.calls.lock().unwrap().push(file_id.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (delay, behavior) = self
                .script
                .get(file_id)
                .cloned()
                .unwrap_or((Duration::ZERO, Behavior::Ack(json!({"deleted": file_id}))));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match behavior {
                Behavior::Ack(payload) => Ok(payload),
                Behavior::Fail(e) => Err(e),
                Behavior::Panic => panic!("executor blew up on {file_id}"),
            }
        }
    }

    fn ids(outcomes: &[DeletionOutcome]) -> Vec<&str> {
        outcomes.iter().map(|o| o.file_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_set_dispatches_nothing() {
        let source = StaticSource::with_ids(&[]);
        let executor = Arc::new(ScriptedExecutor::default());
        let orchestrator = Orchestrator::new(source.clone(), executor.clone());

        let report = orchestrator.run().await.unwrap();

        assert!(report.success);
        assert_eq!(report.message, "No files to delete");
        assert!(report.deleted_files.is_empty());
        assert!(report.errors.is_empty());
        assert!(executor.calls().is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_source_failure_fails_run_without_dispatch() {
        let source = StaticSource::failing("permission denied for function");
        let executor = Arc::new(ScriptedExecutor::default());
        let orchestrator = Orchestrator::new(source, executor.clone());

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Eligibility(_)));
        assert!(err.to_string().contains("permission denied for function"));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_success_passes_payload_through() {
        let source = StaticSource::with_ids(&["abc"]);
        let executor = Arc::new(ScriptedExecutor::default().on("abc", Behavior::Ack(json!({"ok": true}))));
        let report = Orchestrator::new(source, executor.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.message, "Processed 1 files");
        assert_eq!(
            report.deleted_files,
            vec![DeletionOutcome::success("abc", json!({"ok": true}))]
        );
        assert!(report.errors.is_empty());
        assert_eq!(executor.calls(), ["abc"]);
    }

    #[tokio::test]
    async fn test_http_error_is_reported_with_status() {
        let source = StaticSource::with_ids(&["abc"]);
        let executor = Arc::new(ScriptedExecutor::default().on(
            "abc",
            Behavior::Fail(DispatchError::Status {
                status: 500,
                body: "internal".to_string(),
            }),
        ));
        let report = Orchestrator::new(source, executor).run().await.unwrap();

        assert!(report.success);
        assert!(report.deleted_files.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].status, OutcomeStatus::Error);
        assert!(report.errors[0].error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_files() {
        let source = StaticSource::with_ids(&["a", "b", "c"]);
        let executor = Arc::new(
            ScriptedExecutor::default()
                .on(
                    "b",
                    Behavior::Fail(DispatchError::Timeout("operation timed out".to_string())),
                ),
        );
        let report = Orchestrator::new(source, executor.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.message, "Processed 3 files");
        assert_eq!(ids(&report.deleted_files), ["a", "c"]);
        assert_eq!(ids(&report.errors), ["b"]);
        assert!(report.errors[0].error.as_deref().unwrap().starts_with("timeout"));
        assert_eq!(executor.calls(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_panicking_executor_is_isolated() {
        let source = StaticSource::with_ids(&["a", "b", "c"]);
        let executor = Arc::new(ScriptedExecutor::default().on("b", Behavior::Panic));
        let report = Orchestrator::new(source, executor).run().await.unwrap();

        assert_eq!(ids(&report.deleted_files), ["a", "c"]);
        assert_eq!(ids(&report.errors), ["b"]);
        assert!(
            report.errors[0]
                .error
                .as_deref()
                .unwrap()
                .starts_with("deletion task failed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_run_keeps_fetch_order() {
        let source = StaticSource::with_ids(&["a", "b", "c", "d"]);
        // Later files finish first
        let executor = Arc::new(
            ScriptedExecutor::default()
                .on_after("a", Duration::from_millis(400), Behavior::Ack(json!(1)))
                .on_after("b", Duration::from_millis(300), Behavior::Ack(json!(2)))
                .on_after(
                    "c",
                    Duration::from_millis(200),
                    Behavior::Fail(DispatchError::Transport("connection reset".to_string())),
                )
                .on_after("d", Duration::from_millis(100), Behavior::Ack(json!(4))),
        );
        let report = Orchestrator::new(source, executor.clone())
            .with_concurrency(3)
            .run()
            .await
            .unwrap();

        assert_eq!(ids(&report.deleted_files), ["a", "b", "d"]);
        assert_eq!(ids(&report.errors), ["c"]);
        assert_eq!(report.total(), 4);
        let max = executor.max_in_flight.load(Ordering::SeqCst);
        assert!(max > 1 && max <= 3, "max in flight: {max}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_run_has_one_request_in_flight() {
        let source = StaticSource::with_ids(&["a", "b", "c"]);
        let executor = Arc::new(
            ScriptedExecutor::default()
                .on_after("a", Duration::from_millis(50), Behavior::Ack(json!(1)))
                .on_after("b", Duration::from_millis(50), Behavior::Ack(json!(2))),
        );
        Orchestrator::new(source, executor.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(executor.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(executor.calls(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let source = StaticSource::with_ids(&["a", "b"]);
        let executor = Arc::new(ScriptedExecutor::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = Orchestrator::new(source, executor.clone())
            .run_until_cancelled(cancel)
            .await
            .unwrap();

        assert!(executor.calls().is_empty());
        assert!(report.cancelled);
        assert_eq!(report.message, "Processed 0 of 2 files (run cancelled)");
        assert_eq!(ids(&report.errors), ["a", "b"]);
        assert!(
            report
                .errors
                .iter()
                .all(|o| o.error.as_deref() == Some(CANCELLED_BEFORE_DISPATCH))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_yields_partial_report() {
        let source = StaticSource::with_ids(&["a", "b", "c", "d"]);
        let slow = Duration::from_millis(50);
        let executor = Arc::new(
            ScriptedExecutor::default()
                .on_after("a", slow, Behavior::Ack(json!(1)))
                .on_after("b", slow, Behavior::Ack(json!(2)))
                .on_after("c", slow, Behavior::Ack(json!(3)))
                .on_after("d", slow, Behavior::Ack(json!(4))),
        );
        let report = Orchestrator::new(source, executor.clone())
            .with_run_timeout(Some(Duration::from_millis(75)))
            .run()
            .await
            .unwrap();

        // a starts at 0ms, b at 50ms, c would start at 100ms
        assert_eq!(executor.calls(), ["a", "b"]);
        assert!(report.cancelled);
        assert_eq!(report.message, "Processed 2 of 4 files (run cancelled)");
        assert_eq!(ids(&report.deleted_files), ["a", "b"]);
        assert_eq!(ids(&report.errors), ["c", "d"]);
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&["x"], 1)]
    #[case(&["x", "y", "z", "w", "v"], 2)]
    #[tokio::test]
    async fn test_every_file_gets_exactly_one_outcome(
        #[case] file_ids: &[&str],
        #[case] concurrency: usize,
    ) {
        let source = StaticSource::with_ids(file_ids);
        let executor = Arc::new(
            ScriptedExecutor::default()
                .on(
                    "y",
                    Behavior::Fail(DispatchError::Status {
                        status: 404,
                        body: String::new(),
                    }),
                )
                .on("w", Behavior::Panic),
        );
        let report = Orchestrator::new(source, executor)
            .with_concurrency(concurrency)
            .run()
            .await
            .unwrap();

        assert_eq!(report.total(), file_ids.len());
        let mut seen: Vec<&str> = ids(&report.deleted_files);
        seen.extend(ids(&report.errors));
        seen.sort_unstable();
        let mut expected = file_ids.to_vec();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }
}
