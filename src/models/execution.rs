use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RunStatus;

/// Tag written to the global ledger for executions fired by a cron job.
pub const CRON_JOB_SOURCE: &str = "cron-job";

/// One entry of a job's execution ledger (newest first, bounded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHistoryEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Entry of the shared execution ledger that every sweep, whatever triggered
/// it, is appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalExecution {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source: String,
    pub run_id: String,
    /// Machine-readable sweep summary reported by the checker, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

impl GlobalExecution {
    pub fn from_cron_job(
        job_id: &str,
        entry: &ExecutionHistoryEntry,
        summary: Option<serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: entry.timestamp,
            duration: entry.duration,
            status: entry.status,
            error: entry.error.clone(),
            source: CRON_JOB_SOURCE.to_string(),
            run_id: job_id.to_string(),
            summary,
        }
    }
}
