//! Client-side token storage
//!
//! Frameworks built on this crate also act as OAuth *clients* toward MCP
//! servers; this interface stores the tokens and registered client
//! credentials obtained per server URL. Keys are normalized so
//! `HTTPS://Example.com/mcp/` and `https://example.com/mcp` address the same
//! record. Backends are pluggable (OS keychain, database); the crate ships an
//! in-memory default and a JSON file store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

use crate::core::error::{McpError, McpResult};

/// Tokens held for one server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTokens {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Record stored per server URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<StoredTokens>,
    /// Dynamic-registration credentials for this server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            tokens: None,
            client_info: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Normalize a server URL key: lowercase scheme/host, strip trailing slashes
pub fn normalize_server_url(server_url: &str) -> String {
    let trimmed = server_url.trim_end_matches('/');
    match url::Url::parse(trimmed) {
        Ok(parsed) => {
            // Url lowercases scheme and host during parsing
            parsed.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => trimmed.to_lowercase(),
    }
}

/// Pluggable token storage, keyed by normalized server URL
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, server_url: &str) -> McpResult<Option<TokenRecord>>;
    /// Idempotent: overwrites any prior tokens for the server
    async fn set_tokens(&self, server_url: &str, tokens: StoredTokens) -> McpResult<()>;
    /// Idempotent: overwrites any prior client registration for the server
    async fn set_client_info(&self, server_url: &str, client_info: Value) -> McpResult<()>;
    async fn clear(&self, server_url: &str) -> McpResult<()>;
    async fn clear_all(&self) -> McpResult<()>;
    /// Enumerate every stored record
    async fn sessions(&self) -> McpResult<Vec<(String, TokenRecord)>>;
}

/// Default in-memory token store
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, server_url: &str) -> McpResult<Option<TokenRecord>> {
        let key = normalize_server_url(server_url);
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn set_tokens(&self, server_url: &str, tokens: StoredTokens) -> McpResult<()> {
        let key = normalize_server_url(server_url);
        let mut records = self.records.write().await;
        let record = records.entry(key).or_insert_with(TokenRecord::empty);
        record.tokens = Some(tokens);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn set_client_info(&self, server_url: &str, client_info: Value) -> McpResult<()> {
        let key = normalize_server_url(server_url);
        let mut records = self.records.write().await;
        let record = records.entry(key).or_insert_with(TokenRecord::empty);
        record.client_info = Some(client_info);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn clear(&self, server_url: &str) -> McpResult<()> {
        let key = normalize_server_url(server_url);
        self.records.write().await.remove(&key);
        Ok(())
    }

    async fn clear_all(&self) -> McpResult<()> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn sessions(&self) -> McpResult<Vec<(String, TokenRecord)>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// JSON-file-backed token store.
///
/// The whole map is rewritten on every mutation; a mutex serializes access
/// within the process. Corrupt files surface as `McpError::Storage`.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    pretty: bool,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            pretty: false,
            lock: Mutex::new(()),
        }
    }

    pub fn with_pretty_print<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            pretty: true,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> McpResult<HashMap<String, TokenRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| McpError::storage(format!("corrupt token store file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(McpError::storage(format!("read token store: {e}"))),
        }
    }

    async fn save(&self, records: &HashMap<String, TokenRecord>) -> McpResult<()> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(records)?
        } else {
            serde_json::to_vec(records)?
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| McpError::storage(format!("create token store dir: {e}")))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| McpError::storage(format!("write token store: {e}")))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, server_url: &str) -> McpResult<Option<TokenRecord>> {
        let _guard = self.lock.lock().await;
        let records = self.load().await?;
        Ok(records.get(&normalize_server_url(server_url)).cloned())
    }

    async fn set_tokens(&self, server_url: &str, tokens: StoredTokens) -> McpResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = records
            .entry(normalize_server_url(server_url))
            .or_insert_with(TokenRecord::empty);
        record.tokens = Some(tokens);
        record.updated_at = Utc::now();
        self.save(&records).await
    }

    async fn set_client_info(&self, server_url: &str, client_info: Value) -> McpResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = records
            .entry(normalize_server_url(server_url))
            .or_insert_with(TokenRecord::empty);
        record.client_info = Some(client_info);
        record.updated_at = Utc::now();
        self.save(&records).await
    }

    async fn clear(&self, server_url: &str) -> McpResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.remove(&normalize_server_url(server_url));
        self.save(&records).await
    }

    async fn clear_all(&self) -> McpResult<()> {
        let _guard = self.lock.lock().await;
        self.save(&HashMap::new()).await
    }

    async fn sessions(&self) -> McpResult<Vec<(String, TokenRecord)>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().collect())
    }
}
