use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Result of a single deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of dispatching one file to the deletion executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub file_id: String,
    pub status: OutcomeStatus,
    /// Response body of an acknowledged deletion, passed through unparsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Diagnostic for a failed deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeletionOutcome {
    pub fn success(file_id: impl Into<String>, result: JsonValue) -> Self {
        Self {
            file_id: file_id.into(),
            status: OutcomeStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(file_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            status: OutcomeStatus::Error,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Aggregate result of one deletion run.
///
/// Every file fetched for the run appears in exactly one of `deleted_files`
/// or `errors`, in the order it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    /// False only when the run itself failed; per-file errors leave it true
    pub success: bool,
    pub message: String,
    pub deleted_files: Vec<DeletionOutcome>,
    pub errors: Vec<DeletionOutcome>,
    /// Set when the run stopped dispatching before reaching every file
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    #[serde(serialize_with = "serialize_iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl DeletionReport {
    /// Report for a run that found nothing to delete.
    pub fn empty() -> Self {
        Self {
            success: true,
            message: "No files to delete".to_string(),
            deleted_files: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
            timestamp: Utc::now(),
        }
    }

    /// Fold per-file outcomes, already in fetch order, into a report.
    ///
    /// `dispatched` is the number of files a deletion request was actually
    /// issued for; it only differs from `outcomes.len()` when the run was
    /// cancelled.
    pub fn from_outcomes(outcomes: Vec<DeletionOutcome>, dispatched: usize) -> Self {
        let total = outcomes.len();
        let cancelled = dispatched < total;
        let (deleted_files, errors): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition(DeletionOutcome::is_success);

        let message = if cancelled {
            format!("Processed {dispatched} of {total} files (run cancelled)")
        } else {
            format!("Processed {total} files")
        };

        Self {
            success: true,
            message,
            deleted_files,
            errors,
            cancelled,
            timestamp: Utc::now(),
        }
    }

    /// Number of files covered by this report.
    pub fn total(&self) -> usize {
        self.deleted_files.len() + self.errors.len()
    }
}

/// Render timestamps the way `Date.prototype.toISOString` does, which is what
/// existing consumers of the report parse.
pub fn serialize_iso8601<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_report() {
        let report = DeletionReport::empty();
        assert!(report.success);
        assert_eq!(report.message, "No files to delete");
        assert_eq!(report.total(), 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_from_outcomes_partitions_in_order() {
        let report = DeletionReport::from_outcomes(
            vec![
                DeletionOutcome::success("a", json!({"ok": true})),
                DeletionOutcome::failure("b", "HTTP 500: boom"),
                DeletionOutcome::success("c", JsonValue::Null),
                DeletionOutcome::failure("d", "timeout: deadline elapsed"),
            ],
            4,
        );

        assert!(report.success);
        assert_eq!(report.message, "Processed 4 files");
        let ok: Vec<_> = report.deleted_files.iter().map(|o| o.file_id.as_str()).collect();
        let failed: Vec<_> = report.errors.iter().map(|o| o.file_id.as_str()).collect();
        assert_eq!(ok, ["a", "c"]);
        assert_eq!(failed, ["b", "d"]);
        assert_eq!(report.total(), 4);
    }

    #[test]
    fn test_cancelled_message() {
        let report = DeletionReport::from_outcomes(
            vec![
                DeletionOutcome::success("a", JsonValue::Null),
                DeletionOutcome::failure("b", "cancelled before dispatch"),
            ],
            1,
        );
        assert!(report.cancelled);
        assert_eq!(report.message, "Processed 1 of 2 files (run cancelled)");
    }

    #[test]
    fn test_report_wire_shape() {
        let report = DeletionReport::from_outcomes(
            vec![
                DeletionOutcome::success("a", json!({"ok": true})),
                DeletionOutcome::failure("b", "HTTP 404: not found"),
            ],
            2,
        );
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Processed 2 files");
        assert_eq!(
            value["deletedFiles"],
            json!([{"file_id": "a", "status": "success", "result": {"ok": true}}])
        );
        assert_eq!(
            value["errors"],
            json!([{"file_id": "b", "status": "error", "error": "HTTP 404: not found"}])
        );
        assert!(value.get("cancelled").is_none());

        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
