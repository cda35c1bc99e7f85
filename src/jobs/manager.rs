use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::{
    runner::ExecutionRunner,
    scheduler::{JobScheduler, ReconcileReport},
    timer::TimerDriver,
};
use crate::{
    checker::Checker,
    config::SchedulerConfig,
    cron_expression,
    error::Result,
    models::{CronJob, CronJobUpdate, ExecutionHistoryEntry, GlobalExecution, NewCronJob},
    store::{JobStore, KeyValueStore},
};

/// Lifecycle operations over cron jobs: the surface callers talk to.
pub struct CronJobManager {
    store: JobStore,
    scheduler: JobScheduler,
    default_history_page: usize,
}

impl CronJobManager {
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        checker: Arc<dyn Checker>,
        driver: Arc<dyn TimerDriver>,
        config: &SchedulerConfig,
    ) -> Self {
        let store = JobStore::new(backend, config);
        let runner = Arc::new(ExecutionRunner::new(store.clone(), checker));
        let scheduler = JobScheduler::new(store.clone(), runner, driver);

        Self {
            store,
            scheduler,
            default_history_page: config.default_history_page,
        }
    }

    pub const fn store(&self) -> &JobStore {
        &self.store
    }

    pub const fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Validate, persist and (if enabled) start a new job.
    pub async fn create_job(&self, new_job: NewCronJob) -> Result<CronJob> {
        new_job.validate()?;

        let id = Uuid::new_v4().to_string();
        let enabled = new_job.enabled;
        let job = CronJob::new(id.clone(), new_job, Utc::now());
        self.store.put(&job).await?;

        info!(
            "📝 Created cron job '{}'({}) with schedule '{}'",
            job.name, id, job.cron_expression
        );

        if enabled {
            self.scheduler.start(&id).await?;
        }

        // Starting rewrote status and next run
        Ok(self.store.get(&id).await?.unwrap_or(job))
    }

    /// Apply a partial update. Returns `None` for an unknown id.
    pub async fn update_job(&self, id: &str, update: CronJobUpdate) -> Result<Option<CronJob>> {
        update.validate()?;

        let Some(mut job) = self.store.get(id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let was_enabled = job.enabled;
        let was_running = job.status.is_running() || self.scheduler.is_active(id);

        if let Some(name) = update.name {
            job.name = name;
        }
        if let Some(description) = update.description {
            job.description = description;
        }
        if let Some(enabled) = update.enabled {
            job.enabled = enabled;
        }
        let expression_changed = match update.cron_expression {
            Some(expression) if expression != job.cron_expression => {
                job.next_run = cron_expression::next_run_time(&expression, now);
                job.cron_expression = expression;
                true
            }
            _ => false,
        };
        job.updated_at = now;
        if !self.store.update(&job).await? {
            return Ok(None);
        }

        match (was_enabled, job.enabled) {
            (false, true) => {
                self.scheduler.start(id).await?;
            }
            (true, false) => {
                self.scheduler.stop(id).await?;
            }
            _ if expression_changed && was_running => {
                debug!("📅 Rebinding cron job {} to '{}'", id, job.cron_expression);
                self.scheduler.stop(id).await?;
                self.scheduler.start(id).await?;
            }
            _ => {}
        }

        Ok(self.store.get(id).await?)
    }

    /// Stop and remove a job with its history. Returns `false` for an unknown id.
    pub async fn delete_job(&self, id: &str) -> Result<bool> {
        let Some(job) = self.store.get(id).await? else {
            return Ok(false);
        };

        self.scheduler.cancel(id);
        self.store.delete(id).await?;

        info!("🗑️ Deleted cron job '{}'({})", job.name, id);

        Ok(true)
    }

    pub async fn start_job(&self, id: &str) -> Result<bool> {
        self.scheduler.start(id).await
    }

    pub async fn stop_job(&self, id: &str) -> Result<bool> {
        self.scheduler.stop(id).await
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<CronJob>> {
        Ok(self.store.get(id).await?)
    }

    /// All jobs, oldest first.
    pub async fn list_jobs(&self) -> Result<Vec<CronJob>> {
        let mut jobs = self.store.list().await?;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    /// Newest-first executions of one job. `limit` defaults to the configured page size.
    pub async fn get_history(
        &self,
        id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ExecutionHistoryEntry>> {
        let limit = limit.unwrap_or(self.default_history_page);
        Ok(self.store.get_history(id, limit).await?)
    }

    /// Newest-first executions across every job.
    pub async fn global_history(&self, limit: Option<usize>) -> Result<Vec<GlobalExecution>> {
        let limit = limit.unwrap_or(self.default_history_page);
        Ok(self.store.global_executions(limit).await?)
    }

    pub async fn reconcile_on_startup(&self) -> Result<ReconcileReport> {
        self.scheduler.reconcile_on_startup().await
    }

    /// Cancel every timer. Durable state is left alone so the next process
    /// picks the same jobs back up.
    pub fn shutdown(&self) {
        let cancelled = self.scheduler.shutdown();
        info!("🛑 Cancelled {} cron timers", cancelled);
    }
}
