use async_trait::async_trait;
use serde_json::Value;

use super::StoreError;

/// Narrow durable key-value contract the job store is built on.
///
/// A key holds exactly one kind of data: a plain value, a list, or a set of
/// strings. Using a key as the wrong kind is a [`StoreError::WrongType`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove a key of any kind. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Prepend to the list at `key`, then keep only the first `cap` items.
    async fn push_front(&self, key: &str, value: Value, cap: usize) -> Result<(), StoreError>;

    /// First `limit` items of the list at `key`; empty when missing.
    async fn range(&self, key: &str, limit: usize) -> Result<Vec<Value>, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
}
