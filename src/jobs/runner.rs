use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use chrono::{SubsecRound, Utc};
use futures_util::FutureExt as _;
use tracing::{debug, info, warn};

use crate::{
    checker::{Checker, CheckerError, SweepReport},
    cron_expression,
    models::{ExecutionHistoryEntry, GlobalExecution, RunStatus},
    store::{self, JobStore},
};

/// Runs the sweep for a fired timer and records the outcome.
pub struct ExecutionRunner {
    store: JobStore,
    checker: Arc<dyn Checker>,
}

impl ExecutionRunner {
    pub fn new(store: JobStore, checker: Arc<dyn Checker>) -> Self {
        Self { store, checker }
    }

    /// Execute job `id` once.
    ///
    /// Checker failures, including panics, become a `failure` entry and never
    /// an error. The only errors are persistence failures, which the timer
    /// logs before carrying on. Returns `None` when the job no longer exists,
    /// which happens when it is deleted between a fire and the cancellation.
    pub async fn run(&self, id: &str) -> store::Result<Option<ExecutionHistoryEntry>> {
        if self.store.get(id).await?.is_none() {
            warn!("Cron job {} fired but no longer exists, skipping", id);
            return Ok(None);
        }

        // Stored timestamps carry millisecond precision
        let started_at = Utc::now().trunc_subsecs(3);
        let start_time = Instant::now();

        let outcome = self.sweep().await;

        #[allow(clippy::cast_possible_truncation)]
        let duration = start_time.elapsed().as_millis() as i64;

        let (status, error, summary) = match outcome {
            Ok(report) => {
                let error = report.failure_reason();
                let status = if report.is_ok() {
                    RunStatus::Success
                } else {
                    RunStatus::Failure
                };
                (status, error, serde_json::to_value(&report).ok())
            }
            Err(e) => (RunStatus::Failure, Some(e.to_string()), None),
        };

        let entry = ExecutionHistoryEntry {
            timestamp: started_at,
            duration: Some(duration),
            status,
            error,
        };

        // Re-read so fields changed while the sweep ran are kept
        let Some(mut job) = self.store.get(id).await? else {
            warn!("Cron job {} was deleted while running, dropping result", id);
            return Ok(None);
        };

        let now = Utc::now();
        let next_run = cron_expression::next_run_time(&job.cron_expression, now);
        job.record_run(&entry, next_run, now);

        if !self.store.update(&job).await? {
            warn!("Cron job {} was deleted while running, dropping result", id);
            return Ok(None);
        }
        self.store.push_history(id, &entry).await?;
        self.store
            .push_global_execution(&GlobalExecution::from_cron_job(id, &entry, summary))
            .await?;

        if entry.status.is_success() {
            info!(
                "✅ Cron job '{}'({}) completed in {}ms",
                job.name, id, duration
            );
        } else {
            warn!(
                "⚠️ Cron job '{}'({}) failed in {}ms: {}",
                job.name,
                id,
                duration,
                entry.error.as_deref().unwrap_or("unknown error")
            );
        }
        debug!("Cron job {} next run: {:?}", id, next_run);

        Ok(Some(entry))
    }

    async fn sweep(&self) -> Result<SweepReport, CheckerError> {
        match AssertUnwindSafe(self.checker.sweep()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(CheckerError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SchedulerConfig,
        models::{CronJob, NewCronJob},
        store::{KeyValueStore, MemoryStore},
        tests::setup_test::{FlakyStore, MockChecker},
    };
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn runner_with(checker: MockChecker, history_limit: usize) -> (ExecutionRunner, JobStore) {
        let config = SchedulerConfig {
            history_limit,
            ..SchedulerConfig::default()
        };
        let store = JobStore::new(Arc::new(MemoryStore::new()), &config);
        (ExecutionRunner::new(store.clone(), Arc::new(checker)), store)
    }

    async fn insert_job(store: &JobStore, expression: &str) -> CronJob {
        let job = CronJob::new(
            "job-1".to_string(),
            NewCronJob::new("sweep", expression),
            Utc::now(),
        );
        store.put(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_successful_run_updates_job_and_both_ledgers() {
        let (runner, store) = runner_with(MockChecker::healthy(3), 100);
        insert_job(&store, "*/15 * * * *").await;

        let entry = runner.run("job-1").await.unwrap().unwrap();
        assert_eq!(entry.status, RunStatus::Success);

        let job = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.last_run, Some(entry.timestamp));
        assert_eq!(job.last_run_status, Some(RunStatus::Success));
        assert_eq!(job.last_run_error, None);
        assert!(job.last_run_duration.is_some());
        assert!(job.next_run.unwrap() > Utc::now());

        assert_eq!(store.get_history("job-1", 20).await.unwrap(), vec![entry]);

        let global = store.global_executions(10).await.unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].source, "cron-job");
        assert_eq!(global[0].run_id, "job-1");
        assert_eq!(global[0].summary.as_ref().unwrap()["checked"], 3);
    }

    #[tokio::test]
    async fn test_checker_error_is_recorded_as_failure() {
        let checker = MockChecker::healthy(2);
        checker.fail_next("connection refused");
        let (runner, store) = runner_with(checker, 100);
        insert_job(&store, "* * * * *").await;

        let entry = runner.run("job-1").await.unwrap().unwrap();
        assert_eq!(entry.status, RunStatus::Failure);

        let job = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.last_run_status, Some(RunStatus::Failure));
        assert_eq!(job.last_run_error.as_deref(), Some("connection refused"));
        assert!(job.next_run.unwrap() > Utc::now());
        assert_eq!(store.get_history("job-1", 20).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_sweep_is_a_failure() {
        let checker = MockChecker::healthy(5);
        checker.respond_next(SweepReport::new(5, 2));
        let (runner, store) = runner_with(checker, 100);
        insert_job(&store, "* * * * *").await;

        runner.run("job-1").await.unwrap();

        let job = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.last_run_status, Some(RunStatus::Failure));
        assert_eq!(
            job.last_run_error.as_deref(),
            Some("2 of 5 targets reported down")
        );
    }

    #[tokio::test]
    async fn test_panicking_checker_is_contained() {
        let checker = MockChecker::healthy(1);
        checker.panic_next("sweep exploded");
        let (runner, store) = runner_with(checker, 100);
        insert_job(&store, "* * * * *").await;

        let entry = runner.run("job-1").await.unwrap().unwrap();
        assert_eq!(entry.status, RunStatus::Failure);
        assert!(entry.error.unwrap().contains("sweep exploded"));
    }

    #[tokio::test]
    async fn test_missing_job_is_skipped_without_running_checker() {
        let checker = MockChecker::healthy(1);
        let calls = checker.clone();
        let (runner, store) = runner_with(checker, 100);

        assert_eq!(runner.run("ghost").await.unwrap(), None);
        assert_eq!(calls.calls(), 0);
        assert!(store.global_executions(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_capped_with_oldest_evicted() {
        let (runner, store) = runner_with(MockChecker::healthy(1), 3);
        insert_job(&store, "* * * * *").await;

        let mut entries = Vec::new();
        for _ in 0..5 {
            entries.push(runner.run("job-1").await.unwrap().unwrap());
        }

        let history = store.get_history("job-1", 100).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], entries[4]);
        assert_eq!(history[2], entries[2]);
    }

    /// Deletes `job-1` right after the runner's second read of it, which is
    /// the window between the sweep finishing and its result being written.
    struct DeleteAfterSecondRead {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for DeleteAfterSecondRead {
        async fn get(&self, key: &str) -> store::Result<Option<Value>> {
            let value = self.inner.get(key).await?;
            if key == "cron:job:job-1" && self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
                self.inner.set_remove("cron:jobs", "job-1").await?;
                self.inner.delete("cron:job:job-1").await?;
                self.inner.delete("cron:history:job-1").await?;
            }
            Ok(value)
        }

        async fn set(&self, key: &str, value: Value) -> store::Result<()> {
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> store::Result<()> {
            self.inner.delete(key).await
        }

        async fn push_front(&self, key: &str, value: Value, cap: usize) -> store::Result<()> {
            self.inner.push_front(key, value, cap).await
        }

        async fn range(&self, key: &str, limit: usize) -> store::Result<Vec<Value>> {
            self.inner.range(key, limit).await
        }

        async fn set_add(&self, key: &str, member: &str) -> store::Result<()> {
            self.inner.set_add(key, member).await
        }

        async fn set_remove(&self, key: &str, member: &str) -> store::Result<()> {
            self.inner.set_remove(key, member).await
        }

        async fn set_members(&self, key: &str) -> store::Result<Vec<String>> {
            self.inner.set_members(key).await
        }
    }

    #[tokio::test]
    async fn test_job_deleted_during_run_stays_deleted() {
        let backend = Arc::new(DeleteAfterSecondRead {
            inner: MemoryStore::new(),
            reads: AtomicUsize::new(0),
        });
        let store = JobStore::new(backend, &SchedulerConfig::default());
        let runner = ExecutionRunner::new(store.clone(), Arc::new(MockChecker::healthy(1)));
        insert_job(&store, "* * * * *").await;

        assert_eq!(runner.run("job-1").await.unwrap(), None);

        assert!(store.list_ids().await.unwrap().is_empty());
        assert_eq!(store.get("job-1").await.unwrap(), None);
        assert!(store.get_history("job-1", 20).await.unwrap().is_empty());
        assert!(store.global_executions(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_returned_to_caller() {
        let backend = Arc::new(FlakyStore::new());
        let store = JobStore::new(backend.clone(), &SchedulerConfig::default());
        let runner = ExecutionRunner::new(store.clone(), Arc::new(MockChecker::healthy(1)));
        insert_job(&store, "* * * * *").await;

        backend.fail_writes(true);
        assert!(runner.run("job-1").await.is_err());

        backend.fail_writes(false);
        assert!(runner.run("job-1").await.unwrap().is_some());
    }
}
