//! Session store: pluggable persistence for session metadata
//!
//! The session manager keeps live transports in memory and writes session
//! metadata through this interface. The default in-memory implementation is
//! process-local; deployments behind a load balancer plug in a shared store
//! so sessions survive restarts (see recreate-on-demand in the manager).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::error::McpResult;

/// Stored metadata for one session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optional time-to-live; an expired session is treated as absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Free-form data bag
    #[serde(default)]
    pub data: Value,
}

impl SessionRecord {
    pub fn new(id: String, ttl_seconds: Option<u64>, data: Option<Value>) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            ttl_seconds,
            data: data.unwrap_or(Value::Null),
        }
    }

    /// Whether the record is past its TTL
    pub fn is_expired(&self) -> bool {
        match self.ttl_seconds {
            Some(ttl) => {
                let age = Utc::now().signed_duration_since(self.updated_at);
                age.num_seconds() >= 0 && age.num_seconds() as u64 >= ttl
            }
            None => false,
        }
    }
}

/// Pluggable session persistence.
///
/// `exists` and `create` are the operations the manager requires; `get`,
/// `update`, and `delete` complete the management surface.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn exists(&self, id: &str) -> McpResult<bool>;
    async fn create(&self, id: &str, data: Option<Value>) -> McpResult<()>;
    async fn get(&self, id: &str) -> McpResult<Option<SessionRecord>>;
    async fn update(&self, id: &str, data: Value) -> McpResult<()>;
    async fn delete(&self, id: &str) -> McpResult<()>;
    /// Drop expired rows; TTL-bearing backends may leave this a no-op
    async fn sweep_expired(&self) -> McpResult<usize> {
        Ok(0)
    }
}

/// Default in-memory store. Not sharable across processes.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    default_ttl: Option<u64>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a TTL to every session created through this store
    pub fn with_ttl(ttl_seconds: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_ttl: Some(ttl_seconds),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn exists(&self, id: &str) -> McpResult<bool> {
        Ok(self.get(id).await?.is_some())
    }

    async fn create(&self, id: &str, data: Option<Value>) -> McpResult<()> {
        let record = SessionRecord::new(id.to_string(), self.default_ttl, data);
        self.sessions.write().await.insert(id.to_string(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> McpResult<Option<SessionRecord>> {
        // Expired rows are dropped on read rather than waiting for the sweep
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(record) if record.is_expired() => true,
                Some(record) => return Ok(Some(record.clone())),
                None => return Ok(None),
            }
        };
        if expired {
            self.sessions.write().await.remove(id);
        }
        Ok(None)
    }

    async fn update(&self, id: &str, data: Value) -> McpResult<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(record) = sessions.get_mut(id) {
            record.data = data;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> McpResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn sweep_expired(&self) -> McpResult<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired());
        Ok(before - sessions.len())
    }
}
