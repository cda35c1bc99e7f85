//! Durable job records and execution ledgers.
//!
//! [`JobStore`] maps the scheduler's records onto a [`KeyValueStore`]:
//!
//! | key                  | kind  | contents                               |
//! |----------------------|-------|----------------------------------------|
//! | `cron:job:{id}`      | value | [`CronJob`]                            |
//! | `cron:jobs`          | set   | every job id                           |
//! | `cron:history:{id}`  | list  | [`ExecutionHistoryEntry`], newest first |
//! | `executions:history` | list  | [`GlobalExecution`], newest first      |

use std::sync::Arc;

use sea_orm::DbErr;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::{
    config::SchedulerConfig,
    models::{CronJob, ExecutionHistoryEntry, GlobalExecution},
};

pub mod backend;
pub mod database;
pub mod memory;

pub use backend::KeyValueStore;
pub use database::DatabaseStore;
pub use memory::MemoryStore;

const JOB_INDEX_KEY: &str = "cron:jobs";
const GLOBAL_HISTORY_KEY: &str = "executions:history";

fn job_key(id: &str) -> String {
    format!("cron:job:{id}")
}

fn history_key(id: &str) -> String {
    format!("cron:history:{id}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Key '{key}' holds a {found}, expected a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn KeyValueStore>,
    history_limit: usize,
    global_history_limit: usize,
}

impl JobStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, config: &SchedulerConfig) -> Self {
        Self {
            backend,
            history_limit: config.history_limit,
            global_history_limit: config.global_history_limit,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<CronJob>> {
        self.backend
            .get(&job_key(id))
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Write the record and make sure its id is indexed.
    pub async fn put(&self, job: &CronJob) -> Result<()> {
        self.backend
            .set(&job_key(&job.id), serde_json::to_value(job)?)
            .await?;
        self.backend.set_add(JOB_INDEX_KEY, &job.id).await
    }

    /// Overwrite the record of a job that still exists. Returns `false`, and
    /// leaves nothing behind, when the job has been deleted in the meantime.
    pub async fn update(&self, job: &CronJob) -> Result<bool> {
        if !self.is_indexed(&job.id).await? {
            return Ok(false);
        }

        self.backend
            .set(&job_key(&job.id), serde_json::to_value(job)?)
            .await?;

        // A delete that ran between the check and the write
        if !self.is_indexed(&job.id).await? {
            self.backend.delete(&job_key(&job.id)).await?;
            return Ok(false);
        }

        Ok(true)
    }

    async fn is_indexed(&self, id: &str) -> Result<bool> {
        Ok(self.list_ids().await?.iter().any(|indexed| indexed == id))
    }

    /// Remove the index entry, the record and its history.
    ///
    /// The index goes first so a concurrent [`JobStore::update`] sees the
    /// job as gone before its record disappears.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.backend.set_remove(JOB_INDEX_KEY, id).await?;
        self.backend.delete(&job_key(id)).await?;
        self.backend.delete(&history_key(id)).await
    }

    pub async fn list_ids(&self) -> Result<Vec<String>> {
        self.backend.set_members(JOB_INDEX_KEY).await
    }

    /// Every indexed job. Ids whose record has disappeared are skipped.
    pub async fn list(&self) -> Result<Vec<CronJob>> {
        let mut jobs = Vec::new();

        for id in self.list_ids().await? {
            match self.get(&id).await? {
                Some(job) => jobs.push(job),
                None => warn!("Job {} is indexed but has no record", id),
            }
        }

        Ok(jobs)
    }

    pub async fn push_history(&self, id: &str, entry: &ExecutionHistoryEntry) -> Result<()> {
        self.backend
            .push_front(
                &history_key(id),
                serde_json::to_value(entry)?,
                self.history_limit,
            )
            .await
    }

    /// Newest-first history, at most `limit` entries.
    pub async fn get_history(&self, id: &str, limit: usize) -> Result<Vec<ExecutionHistoryEntry>> {
        let values = self
            .backend
            .range(&history_key(id), limit.min(self.history_limit))
            .await?;
        decode_all(values)
    }

    pub async fn push_global_execution(&self, execution: &GlobalExecution) -> Result<()> {
        self.backend
            .push_front(
                GLOBAL_HISTORY_KEY,
                serde_json::to_value(execution)?,
                self.global_history_limit,
            )
            .await
    }

    pub async fn global_executions(&self, limit: usize) -> Result<Vec<GlobalExecution>> {
        let values = self
            .backend
            .range(GLOBAL_HISTORY_KEY, limit.min(self.global_history_limit))
            .await?;
        decode_all(values)
    }
}

fn decode_all<T: DeserializeOwned>(values: Vec<serde_json::Value>) -> Result<Vec<T>> {
    values
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<_, _>>()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCronJob, RunStatus};
    use chrono::{Duration, Utc};

    fn store_with_limits(history_limit: usize, global_history_limit: usize) -> JobStore {
        let config = SchedulerConfig {
            history_limit,
            global_history_limit,
            ..SchedulerConfig::default()
        };
        JobStore::new(Arc::new(MemoryStore::new()), &config)
    }

    fn job(id: &str) -> CronJob {
        CronJob::new(id.to_string(), NewCronJob::new(id, "0 * * * *"), Utc::now())
    }

    fn entry(minutes_ago: i64) -> ExecutionHistoryEntry {
        ExecutionHistoryEntry {
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            duration: Some(5),
            status: RunStatus::Success,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_put_get_and_index() {
        let store = store_with_limits(100, 1000);

        store.put(&job("a")).await.unwrap();
        store.put(&job("b")).await.unwrap();
        store.put(&job("a")).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().name, "a");
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert_eq!(store.list_ids().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_record_history_and_index() {
        let store = store_with_limits(100, 1000);
        store.put(&job("a")).await.unwrap();
        store.push_history("a", &entry(0)).await.unwrap();

        store.delete("a").await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.get_history("a", 20).await.unwrap().is_empty());
        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_never_resurrects_a_deleted_job() {
        let store = store_with_limits(100, 1000);
        let mut stored = job("a");
        store.put(&stored).await.unwrap();

        stored.name = "renamed".to_string();
        assert!(store.update(&stored).await.unwrap());
        assert_eq!(store.get("a").await.unwrap().unwrap().name, "renamed");

        store.delete("a").await.unwrap();
        assert!(!store.update(&stored).await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_capped() {
        let store = store_with_limits(3, 1000);

        for minutes_ago in (0..5).rev() {
            store.push_history("a", &entry(minutes_ago)).await.unwrap();
        }

        let history = store.get_history("a", 20).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history
            .windows(2)
            .all(|pair| pair[0].timestamp > pair[1].timestamp));
        assert_eq!(store.get_history("a", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_global_ledger_is_capped_independently() {
        let store = store_with_limits(2, 4);

        for minutes_ago in 0..6 {
            let execution = GlobalExecution::from_cron_job("a", &entry(minutes_ago), None);
            store.push_global_execution(&execution).await.unwrap();
        }

        let executions = store.global_executions(100).await.unwrap();
        assert_eq!(executions.len(), 4);
        assert!(executions.iter().all(|e| e.source == "cron-job" && e.run_id == "a"));
    }
}
