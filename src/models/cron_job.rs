use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{ExecutionHistoryEntry, JobStatus, RunStatus};
use crate::cron_expression;

/// A named schedule that triggers a health-check sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cron_expression: String,
    /// Durable intent: the job should be scheduled whenever the process runs.
    pub enabled: bool,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_error: Option<String>,
}

impl CronJob {
    /// Build a fresh, stopped job. The caller persists it and starts it.
    pub fn new(id: String, new_job: NewCronJob, now: DateTime<Utc>) -> Self {
        let next_run = cron_expression::next_run_time(&new_job.cron_expression, now);

        Self {
            id,
            name: new_job.name,
            description: new_job.description,
            cron_expression: new_job.cron_expression,
            enabled: new_job.enabled,
            status: JobStatus::Stopped,
            created_at: now,
            updated_at: now,
            last_run: None,
            next_run,
            last_run_duration: None,
            last_run_status: None,
            last_run_error: None,
        }
    }

    /// Copy the outcome of an execution onto the record.
    pub fn record_run(
        &mut self,
        entry: &ExecutionHistoryEntry,
        next_run: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        self.last_run = Some(entry.timestamp);
        self.last_run_duration = entry.duration;
        self.last_run_status = Some(entry.status);
        self.last_run_error = match entry.status {
            RunStatus::Success => None,
            RunStatus::Failure => entry.error.clone(),
        };
        self.next_run = next_run;
        self.updated_at = now;
    }
}

/// Input for creating a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCronJob {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(
        length(min = 1, message = "cron expression is required"),
        custom(function = "validate_cron_expression")
    )]
    pub cron_expression: String,
    #[serde(default)]
    pub enabled: bool,
}

impl NewCronJob {
    pub fn new(name: impl Into<String>, cron_expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cron_expression: cron_expression.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CronJobUpdate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(
        length(min = 1, message = "cron expression must not be empty"),
        custom(function = "validate_cron_expression")
    )]
    pub cron_expression: Option<String>,
    pub enabled: Option<bool>,
}

fn validate_cron_expression(expression: &str) -> Result<(), ValidationError> {
    if cron_expression::validate(expression) {
        Ok(())
    } else {
        Err(ValidationError::new("cron_expression")
            .with_message("must be 5 fields of *, n, a-b, a,b,c or */n".into()))
    }
}
