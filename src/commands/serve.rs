use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    app_info::AppInfo,
    checker::Checker,
    config::{Config, StorageConfig},
    database::setup_database,
    jobs::{CronJobManager, TokioTimerDriver},
    store::{DatabaseStore, KeyValueStore, MemoryStore, StoreError},
};

pub async fn handle_serve_command(app_info: AppInfo, config: Config, checker: Arc<dyn Checker>) {
    info!(
        "🚀 Starting {} with {} storage",
        app_info.label(),
        config.storage.describe()
    );

    let backend = match build_backend(&config.storage).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("❌ Storage setup failed: {}", e);
            return;
        }
    };

    let manager = CronJobManager::new(
        backend,
        checker,
        Arc::new(TokioTimerDriver::new()),
        &config.scheduler,
    );

    // Not ready until every enabled job has a timer
    match manager.reconcile_on_startup().await {
        Ok(report) => {
            for (id, reason) in &report.failed {
                warn!("⚠️ Cron job {} was not started: {}", id, reason);
            }
            info!("✅ Scheduler ready with {} active jobs", report.started.len());
        }
        Err(e) => {
            error!("❌ Could not restore cron jobs: {}", e);
            return;
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    manager.shutdown();
}

pub async fn build_backend(storage: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match storage {
        StorageConfig::Memory => {
            warn!("Using in-memory storage, jobs will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageConfig::Database(database) => {
            let db = setup_database(database).await?;
            info!("✅ Database is ready!");
            Ok(Arc::new(DatabaseStore::new(db)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_database_backend_is_migrated_and_usable() {
        let storage = StorageConfig::Database(DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            pool_size: 1,
        });

        let backend = build_backend(&storage).await.unwrap();
        backend.set("k", json!({"a": 1})).await.unwrap();

        assert_eq!(backend.get("k").await.unwrap(), Some(json!({"a": 1})));
    }
}
