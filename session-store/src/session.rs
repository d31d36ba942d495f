//! Per-user session records and the adapter over the expiring store.

use crate::error::StoreError;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Session lifetime with no further activity, unless a scenario overrides it.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Where a user is in the scenario tree, plus the data hooks keep across
/// turns. The data map is cleared whenever the user's resolved position is
/// the root node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub path: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl UserSession {
    /// Session of a user never seen before (or whose record expired): at the
    /// root with no data.
    pub fn at_root() -> Self {
        Self {
            path: "/".to_string(),
            data: Map::new(),
        }
    }
}

impl Default for UserSession {
    fn default() -> Self {
        Self::at_root()
    }
}

/// Loads and saves [`UserSession`] records with a configurable default TTL.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    default_ttl: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn key(user_id: i64) -> String {
        format!("session:{user_id}")
    }

    /// Loads a user's session; absent or expired records default to root.
    pub async fn load(&self, user_id: i64) -> Result<UserSession, StoreError> {
        match self.store.get(&Self::key(user_id)).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => {
                debug!(user_id, "no stored session, starting at root");
                Ok(UserSession::at_root())
            }
        }
    }

    /// Persists a session. A non-zero `ttl_override` wins over the default.
    pub async fn save(
        &self,
        user_id: i64,
        session: &UserSession,
        ttl_override: Option<Duration>,
    ) -> Result<(), StoreError> {
        let ttl = match ttl_override {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => self.default_ttl,
        };
        let value = serde_json::to_value(session)?;
        self.store.put(&Self::key(user_id), value, ttl).await
    }

    /// Drops a user's session.
    pub async fn remove(&self, user_id: i64) -> Result<(), StoreError> {
        self.store.delete(&Self::key(user_id)).await
    }
}
