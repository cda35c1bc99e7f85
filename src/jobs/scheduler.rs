use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use super::{
    runner::ExecutionRunner,
    timer::{BoxFuture, TimerCallback, TimerDriver, TimerHandle},
};
use crate::{
    cron_expression::{self, CronExpression},
    error::{Error, Result},
    models::JobStatus,
    store::JobStore,
};

/// Outcome of rebuilding timers from the store at startup.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Ids of jobs that now have a timer.
    pub started: Vec<String>,
    /// Enabled jobs that could not be started (id, reason).
    pub failed: Vec<(String, String)>,
}

/// Owns the timers of this process, one per running job.
///
/// The registry is never persisted: the store's `enabled` flags are the truth
/// and [`JobScheduler::reconcile_on_startup`] rebuilds the registry from them.
pub struct JobScheduler {
    store: JobStore,
    runner: Arc<ExecutionRunner>,
    driver: Arc<dyn TimerDriver>,
    timers: DashMap<String, Box<dyn TimerHandle>>,
}

impl JobScheduler {
    pub fn new(store: JobStore, runner: Arc<ExecutionRunner>, driver: Arc<dyn TimerDriver>) -> Self {
        Self {
            store,
            runner,
            driver,
            timers: DashMap::new(),
        }
    }

    /// Register a fresh timer for job `id`, replacing any existing one, and
    /// mark the job running. Returns `false` if the job does not exist.
    pub async fn start(&self, id: &str) -> Result<bool> {
        let Some(mut job) = self.store.get(id).await? else {
            self.cancel(id);
            return Ok(false);
        };

        self.cancel(id);
        let now = Utc::now();

        let expression = match CronExpression::parse(&job.cron_expression) {
            Ok(expression) => expression,
            Err(e) => {
                warn!(
                    "❌ Cron job '{}'({}) has an unusable expression '{}': {}",
                    job.name, id, job.cron_expression, e
                );
                job.status = JobStatus::Error;
                job.next_run = None;
                job.updated_at = now;
                self.store.update(&job).await?;
                return Err(Error::InvalidCronExpression(job.cron_expression));
            }
        };

        let handle = self.driver.schedule(expression, self.callback_for(id));
        // A concurrent start may have registered in the meantime; keep only ours
        if let Some(previous) = self.timers.insert(id.to_string(), handle) {
            previous.cancel();
        }

        job.status = JobStatus::Running;
        job.next_run = cron_expression::next_run_time(&job.cron_expression, now);
        job.updated_at = now;
        if !self.store.update(&job).await? {
            // Deleted while starting
            self.cancel(id);
            return Ok(false);
        }

        debug!(
            "📅 Started cron job '{}'({}) with schedule '{}', next run {:?}",
            job.name, id, job.cron_expression, job.next_run
        );

        Ok(true)
    }

    /// Cancel the job's timer (if any) and mark it stopped. Returns `false`
    /// if the job does not exist.
    pub async fn stop(&self, id: &str) -> Result<bool> {
        let Some(mut job) = self.store.get(id).await? else {
            return Ok(false);
        };

        if self.cancel(id) {
            debug!("📅 Stopped cron job '{}'({})", job.name, id);
        }

        job.status = JobStatus::Stopped;
        job.updated_at = Utc::now();
        Ok(self.store.update(&job).await?)
    }

    /// Drop the timer for `id` without touching the store.
    pub fn cancel(&self, id: &str) -> bool {
        match self.timers.remove(id) {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Start every job whose durable `enabled` flag is set.
    ///
    /// Whatever the registry held before is cancelled first.
    pub async fn reconcile_on_startup(&self) -> Result<ReconcileReport> {
        let discarded = self.shutdown();
        if discarded > 0 {
            warn!("Discarded {} timers before reconciling", discarded);
        }

        let jobs = self.store.list().await?;
        let mut report = ReconcileReport::default();

        for job in jobs.into_iter().filter(|job| job.enabled) {
            match self.start(&job.id).await {
                Ok(true) => report.started.push(job.id),
                Ok(false) => report
                    .failed
                    .push((job.id, "job disappeared during startup".to_string())),
                Err(e) => {
                    error!("❌ Failed to start cron job '{}'({}): {}", job.name, job.id, e);
                    report.failed.push((job.id, e.to_string()));
                }
            }
        }

        info!(
            "📅 Reconciled cron jobs: {} started, {} failed",
            report.started.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Cancel every timer. Returns how many were cancelled.
    pub fn shutdown(&self) -> usize {
        let mut cancelled = 0;
        self.timers.retain(|_, handle| {
            handle.cancel();
            cancelled += 1;
            false
        });
        cancelled
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.timers.contains_key(id)
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn active_job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.timers.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    fn callback_for(&self, id: &str) -> TimerCallback {
        let runner = Arc::clone(&self.runner);
        let id = id.to_string();

        Arc::new(move || -> BoxFuture<'static, ()> {
            let runner = Arc::clone(&runner);
            let id = id.clone();
            Box::pin(async move {
                // The timer keeps firing whatever happens to this execution
                if let Err(e) = runner.run(&id).await {
                    error!("❌ Failed to record execution of cron job {}: {}", id, e);
                }
            })
        })
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
