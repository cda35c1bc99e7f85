use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    sea_query::OnConflict, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    Set, Statement, TransactionTrait,
};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use super::{backend::KeyValueStore, StoreError};
use crate::database::models::kv_entry::{self, Entity as KvEntry};

/// Backend storing every key as one JSON row of `kv_entry`.
///
/// Lists and sets are JSON arrays, mutated read-modify-write inside a
/// transaction. On Postgres a per-key advisory lock is held for the
/// duration. SQLite cannot upgrade two concurrent deferred transactions to
/// writers, so there every write goes through one in-process lock instead.
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
    write_lock: Option<Arc<Mutex<()>>>,
}

impl DatabaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        let write_lock = (db.get_database_backend() == DbBackend::Sqlite)
            .then(|| Arc::new(Mutex::new(())));

        Self { db, write_lock }
    }

    async fn lock_writes(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    async fn load<C: ConnectionTrait>(conn: &C, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(KvEntry::find_by_id(key.to_string())
            .one(conn)
            .await?
            .map(|entry| entry.value))
    }

    /// Serialize writers of `key` until the transaction ends. Also covers keys
    /// that have no row yet.
    async fn lock_key_postgres<C: ConnectionTrait>(conn: &C, key: &str) -> Result<(), StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtext($1))",
            [key.into()],
        );
        conn.execute(stmt).await?;
        Ok(())
    }

    async fn upsert<C: ConnectionTrait>(conn: &C, key: &str, value: Value) -> Result<(), StoreError> {
        let entry = kv_entry::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
        };

        KvEntry::insert(entry)
            .on_conflict(
                OnConflict::column(kv_entry::Column::Key)
                    .update_column(kv_entry::Column::Value)
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(())
    }

    /// Load the array at `key`, let `mutate` change it, and write it back in
    /// the same transaction, with other writers of the store locked out.
    async fn update_array<F>(
        &self,
        key: &str,
        expected: &'static str,
        mutate: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Vec<Value>) + Send,
    {
        let _guard = self.lock_writes().await;
        let txn = self.db.begin().await?;
        if self.db.get_database_backend() == DbBackend::Postgres {
            Self::lock_key_postgres(&txn, key).await?;
        }

        let mut items = match Self::load(&txn, key).await? {
            None => Vec::new(),
            Some(value) => into_array(key, expected, value)?,
        };
        mutate(&mut items);
        Self::upsert(&txn, key, Value::Array(items)).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn load_array(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Vec<Value>, StoreError> {
        match Self::load(&self.db, key).await? {
            None => Ok(Vec::new()),
            Some(value) => into_array(key, expected, value),
        }
    }
}

fn into_array(key: &str, expected: &'static str, value: Value) -> Result<Vec<Value>, StoreError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(StoreError::WrongType {
            key: key.to_string(),
            expected,
            found: "value",
        }),
    }
}

#[async_trait]
impl KeyValueStore for DatabaseStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Self::load(&self.db, key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock_writes().await;
        Self::upsert(&self.db, key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock_writes().await;
        KvEntry::delete_by_id(key.to_string()).exec(&self.db).await?;
        Ok(())
    }

    async fn push_front(&self, key: &str, value: Value, cap: usize) -> Result<(), StoreError> {
        self.update_array(key, "list", move |items| {
            items.insert(0, value);
            items.truncate(cap);
        })
        .await
    }

    async fn range(&self, key: &str, limit: usize) -> Result<Vec<Value>, StoreError> {
        let mut items = self.load_array(key, "list").await?;
        items.truncate(limit);
        Ok(items)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let member = member.to_string();
        self.update_array(key, "set", move |items| {
            if !items.iter().any(|item| item.as_str() == Some(member.as_str())) {
                items.push(Value::String(member));
            }
        })
        .await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let member = member.to_string();
        self.update_array(key, "set", move |items| {
            items.retain(|item| item.as_str() != Some(member.as_str()));
        })
        .await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .load_array(key, "set")
            .await?
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect())
    }
}
