//! Dynamic client registration store (RFC 7591)
//!
//! The authorization server registers OAuth clients at runtime and validates
//! their credentials and redirect URIs on every authorize/token request.
//! Backends are pluggable; the in-memory default expires clients by TTL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::error::{McpError, McpResult};

/// Registration request body, per RFC 7591
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientMetadata {
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// A registered OAuth client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientRegistration {
    pub client_id: String,
    /// Absent for public clients (`token_endpoint_auth_method = "none"`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Absent when the client never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ClientRegistration {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Public clients authenticate with no secret
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == "none"
    }
}

/// Pluggable DCR client storage
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Register a new client and return its credentials
    async fn register(&self, metadata: ClientMetadata) -> McpResult<ClientRegistration>;
    /// Authenticate a client id (and secret, for confidential clients)
    async fn validate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> McpResult<ClientRegistration>;
    async fn get(&self, client_id: &str) -> McpResult<Option<ClientRegistration>>;
    /// Exact-match check against the registered redirect URI set
    async fn validate_redirect_uri(&self, client_id: &str, uri: &str) -> McpResult<bool>;
    async fn delete(&self, client_id: &str) -> McpResult<bool>;
    async fn list(&self) -> McpResult<Vec<ClientRegistration>>;
    /// Drop expired registrations; backends with TTL-bearing storage may
    /// leave this a no-op
    async fn sweep_expired(&self) -> McpResult<usize> {
        Ok(0)
    }
}

/// Default in-memory client store
#[derive(Debug)]
pub struct InMemoryClientStore {
    clients: RwLock<HashMap<String, ClientRegistration>>,
    client_id_prefix: String,
    /// Client lifetime in seconds; 0 means never expires
    client_ttl_seconds: u64,
}

impl Default for InMemoryClientStore {
    fn default() -> Self {
        Self::new("mcp_", 0)
    }
}

impl InMemoryClientStore {
    pub fn new<S: Into<String>>(client_id_prefix: S, client_ttl_seconds: u64) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            client_id_prefix: client_id_prefix.into(),
            client_ttl_seconds,
        }
    }

}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time equality over secrets
fn secrets_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn register(&self, metadata: ClientMetadata) -> McpResult<ClientRegistration> {
        if metadata.redirect_uris.is_empty() {
            return Err(McpError::oauth("redirect_uris is required"));
        }

        let auth_method = metadata
            .token_endpoint_auth_method
            .unwrap_or_else(|| "client_secret_basic".to_string());
        let client_secret = if auth_method == "none" {
            None
        } else {
            Some(random_secret())
        };

        let created_at = Utc::now();
        let expires_at = (self.client_ttl_seconds > 0)
            .then(|| created_at + Duration::seconds(self.client_ttl_seconds as i64));

        let registration = ClientRegistration {
            client_id: format!("{}{}", self.client_id_prefix, Uuid::new_v4().simple()),
            client_secret,
            redirect_uris: metadata.redirect_uris,
            grant_types: metadata
                .grant_types
                .unwrap_or_else(|| vec!["authorization_code".to_string()]),
            response_types: metadata
                .response_types
                .unwrap_or_else(|| vec!["code".to_string()]),
            token_endpoint_auth_method: auth_method,
            client_name: metadata.client_name,
            scope: metadata.scope,
            created_at,
            expires_at,
        };

        self.clients
            .write()
            .await
            .insert(registration.client_id.clone(), registration.clone());

        Ok(registration)
    }

    async fn validate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> McpResult<ClientRegistration> {
        let client = self
            .get(client_id)
            .await?
            .ok_or_else(|| McpError::oauth("unknown client"))?;

        if client.is_public() {
            return Ok(client);
        }

        let expected = client
            .client_secret
            .as_deref()
            .ok_or_else(|| McpError::oauth("client has no secret"))?;
        match client_secret {
            Some(secret) if secrets_match(secret, expected) => Ok(client),
            _ => Err(McpError::oauth("invalid client credentials")),
        }
    }

    async fn get(&self, client_id: &str) -> McpResult<Option<ClientRegistration>> {
        let clients = self.clients.read().await;
        Ok(clients
            .get(client_id)
            .filter(|client| !client.is_expired())
            .cloned())
    }

    async fn validate_redirect_uri(&self, client_id: &str, uri: &str) -> McpResult<bool> {
        Ok(self
            .get(client_id)
            .await?
            .is_some_and(|client| client.redirect_uris.iter().any(|u| u == uri)))
    }

    async fn delete(&self, client_id: &str) -> McpResult<bool> {
        Ok(self.clients.write().await.remove(client_id).is_some())
    }

    async fn list(&self) -> McpResult<Vec<ClientRegistration>> {
        Ok(self.clients.read().await.values().cloned().collect())
    }

    async fn sweep_expired(&self) -> McpResult<usize> {
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|_, client| !client.is_expired());
        Ok(before - clients.len())
    }
}
