//! Expiring key/value store: the persistence interface sessions live behind.
//!
//! The in-memory implementation suits single-process deployments and tests;
//! a database-backed implementation only has to provide the same three
//! operations.

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Async key/value store with per-entry time-to-live.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value for `key`, or None when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    /// Stores `value` under `key` for `ttl`.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError>;
    /// Removes `key` if present.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-memory store; entries expire lazily on read.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including not-yet-collected expired ones.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }
        // expired: collect it under the write lock
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
