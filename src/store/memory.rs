use std::collections::{BTreeSet, VecDeque};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{backend::KeyValueStore, StoreError};

#[derive(Debug, Clone)]
enum Entry {
    Value(Value),
    List(VecDeque<Value>),
    Set(BTreeSet<String>),
}

impl Entry {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::List(_) => "list",
            Self::Set(_) => "set",
        }
    }
}

/// Process-local backend. State lives as long as the value does, so it is
/// only durable across scheduler restarts that share the same instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn wrong_type(key: &str, expected: &'static str, found: &Entry) -> StoreError {
        StoreError::WrongType {
            key: key.to_string(),
            expected,
            found: found.kind(),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.entries.get(key).as_deref() {
            None => Ok(None),
            Some(Entry::Value(value)) => Ok(Some(value.clone())),
            Some(other) => Err(Self::wrong_type(key, "value", other)),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), Entry::Value(value));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn push_front(&self, key: &str, value: Value, cap: usize) -> Result<(), StoreError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));

        match entry.value_mut() {
            Entry::List(items) => {
                items.push_front(value);
                items.truncate(cap);
                Ok(())
            }
            other => Err(Self::wrong_type(key, "list", other)),
        }
    }

    async fn range(&self, key: &str, limit: usize) -> Result<Vec<Value>, StoreError> {
        match self.entries.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(Entry::List(items)) => Ok(items.iter().take(limit).cloned().collect()),
            Some(other) => Err(Self::wrong_type(key, "list", other)),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));

        match entry.value_mut() {
            Entry::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            other => Err(Self::wrong_type(key, "set", other)),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        match self.entries.get_mut(key).as_deref_mut() {
            None => Ok(()),
            Some(Entry::Set(members)) => {
                members.remove(member);
                Ok(())
            }
            Some(other) => Err(Self::wrong_type(key, "set", other)),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.entries.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(other) => Err(Self::wrong_type(key, "set", other)),
        }
    }
}
