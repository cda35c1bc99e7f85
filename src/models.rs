//! Durable records owned by the scheduler.
//!
//! Everything here is serialized as camelCase JSON with epoch-millisecond
//! timestamps, which is the shape the key-value backend stores.

mod cron_job;
mod execution;
mod job_status;

pub use cron_job::{CronJob, CronJobUpdate, NewCronJob};
pub use execution::{ExecutionHistoryEntry, GlobalExecution, CRON_JOB_SOURCE};
pub use job_status::{JobStatus, RunStatus};
