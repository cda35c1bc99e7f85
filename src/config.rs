use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracing: TracingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub log_level: String,
}

/// Where job records and ledgers are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-process store; nothing survives a restart of the process
    Memory,
    /// SQL database (Postgres or SQLite) holding a key-value table
    Database(DatabaseConfig),
}

impl StorageConfig {
    /// Short description without credentials, e.g. `database (postgres)`.
    pub fn describe(&self) -> String {
        match self {
            Self::Memory => "memory".to_string(),
            Self::Database(database) => {
                let scheme = database
                    .url
                    .split_once(':')
                    .map_or("unknown", |(scheme, _)| scheme);
                format!("database ({scheme})")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Entries kept per job in its execution history (default: 100)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Entries kept in the shared execution ledger (default: 1000)
    #[serde(default = "default_global_history_limit")]
    pub global_history_limit: usize,
    /// History entries returned when the caller does not ask for a number (default: 20)
    #[serde(default = "default_history_page")]
    pub default_history_page: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            global_history_limit: default_global_history_limit(),
            default_history_page: default_history_page(),
        }
    }
}

const fn default_pool_size() -> u32 {
    5
}

const fn default_history_limit() -> usize {
    100
}

const fn default_global_history_limit() -> usize {
    1000
}

const fn default_history_page() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_section_is_optional() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "tracing": { "log_level": "info" },
            "storage": { "type": "memory" }
        }))
        .unwrap();

        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.scheduler.history_limit, 100);
        assert_eq!(config.scheduler.global_history_limit, 1000);
        assert_eq!(config.scheduler.default_history_page, 20);
    }

    #[test]
    fn test_database_storage_defaults_pool_size() {
        let storage: StorageConfig = serde_json::from_value(serde_json::json!({
            "type": "database",
            "url": "postgres://localhost/healthcron"
        }))
        .unwrap();

        let StorageConfig::Database(database) = storage else {
            panic!("expected database storage");
        };
        assert_eq!(database.url, "postgres://localhost/healthcron");
        assert_eq!(database.pool_size, 5);
    }

    #[test]
    fn test_storage_description_hides_credentials() {
        let storage = StorageConfig::Database(DatabaseConfig {
            url: "postgres://admin:secret@db:5432/healthcron".to_string(),
            pool_size: 5,
        });

        assert_eq!(storage.describe(), "database (postgres)");
        assert_eq!(StorageConfig::Memory.describe(), "memory");
    }
}
