//! Authorization server configuration
//!
//! Required secrets: `session_secret` signs proxy state, `jwt_signing_secret`
//! signs access tokens, and `jwt_encryption_secret` (32 bytes, hex-encoded)
//! encrypts the upstream credential into the `upstream_token` claim. The
//! signing and encryption keys are independent; leaking one does not expose
//! what the other protects.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::error::{McpError, McpResult};

/// Upstream identity provider federated to during authorization
#[derive(Debug, Clone)]
pub struct UpstreamProviderConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    /// Optional user-info endpoint; fetch failures degrade to `sub:"unknown"`
    pub user_info_endpoint: Option<String>,
}

/// Hook adding or overriding custom claims before an access token is signed
pub type TokenMapper = Arc<dyn Fn(&mut Map<String, Value>) + Send + Sync>;

/// Authorization server configuration
#[derive(Clone)]
pub struct OAuthConfig {
    /// Issuer URL, also the default audience
    pub issuer: String,
    /// Key for the HMAC suffix on proxy state values
    pub session_secret: String,
    /// HS256 key for access-token signatures
    pub jwt_signing_secret: String,
    /// AES-256-GCM key guarding the upstream credential
    pub jwt_encryption_secret: [u8; 32],
    pub upstream: UpstreamProviderConfig,
    pub scopes_supported: Vec<String>,
    /// Dynamic client registration toggle
    pub enable_dcr: bool,
    pub client_id_prefix: String,
    /// DCR client lifetime in seconds; 0 means never expires
    pub client_ttl_seconds: u64,
    pub token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub token_mapper: Option<TokenMapper>,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("issuer", &self.issuer)
            .field("scopes_supported", &self.scopes_supported)
            .field("enable_dcr", &self.enable_dcr)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("has_token_mapper", &self.token_mapper.is_some())
            .finish()
    }
}

impl OAuthConfig {
    /// Build a configuration from the required values. The encryption secret
    /// must be 32 bytes of hex.
    pub fn new(
        issuer: impl Into<String>,
        session_secret: impl Into<String>,
        jwt_signing_secret: impl Into<String>,
        jwt_encryption_secret_hex: &str,
        upstream: UpstreamProviderConfig,
    ) -> McpResult<Self> {
        let config = Self {
            issuer: issuer.into(),
            session_secret: session_secret.into(),
            jwt_signing_secret: jwt_signing_secret.into(),
            jwt_encryption_secret: decode_encryption_secret(jwt_encryption_secret_hex)?,
            upstream,
            scopes_supported: vec!["openid".to_string(), "profile".to_string()],
            enable_dcr: true,
            client_id_prefix: "mcp_".to_string(),
            client_ttl_seconds: 0,
            token_ttl_seconds: 3600,
            refresh_token_ttl_seconds: 2_592_000,
            token_mapper: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from `MCP_*` environment variables
    pub fn from_env() -> McpResult<Self> {
        let upstream = UpstreamProviderConfig {
            authorization_endpoint: require_env("MCP_UPSTREAM_AUTHORIZATION_ENDPOINT")?,
            token_endpoint: require_env("MCP_UPSTREAM_TOKEN_ENDPOINT")?,
            client_id: require_env("MCP_UPSTREAM_CLIENT_ID")?,
            client_secret: require_env("MCP_UPSTREAM_CLIENT_SECRET")?,
            scopes: std::env::var("MCP_UPSTREAM_SCOPES")
                .map(|s| s.split(' ').map(String::from).collect())
                .unwrap_or_default(),
            user_info_endpoint: std::env::var("MCP_UPSTREAM_USER_INFO_ENDPOINT").ok(),
        };

        let mut config = Self::new(
            require_env("MCP_ISSUER")?,
            require_env("MCP_SESSION_SECRET")?,
            require_env("MCP_JWT_SIGNING_SECRET")?,
            &require_env("MCP_JWT_ENCRYPTION_SECRET")?,
            upstream,
        )?;

        if let Ok(scopes) = std::env::var("MCP_SCOPES_SUPPORTED") {
            config.scopes_supported = scopes.split(' ').map(String::from).collect();
        }
        if let Ok(enable) = std::env::var("MCP_ENABLE_DCR") {
            config.enable_dcr = enable != "false" && enable != "0";
        }
        if let Ok(ttl) = std::env::var("MCP_TOKEN_TTL") {
            config.token_ttl_seconds = ttl
                .parse()
                .map_err(|_| McpError::config("MCP_TOKEN_TTL must be an integer"))?;
        }
        if let Ok(ttl) = std::env::var("MCP_REFRESH_TOKEN_TTL") {
            config.refresh_token_ttl_seconds = ttl
                .parse()
                .map_err(|_| McpError::config("MCP_REFRESH_TOKEN_TTL must be an integer"))?;
        }
        if let Ok(ttl) = std::env::var("MCP_CLIENT_TTL") {
            config.client_ttl_seconds = ttl
                .parse()
                .map_err(|_| McpError::config("MCP_CLIENT_TTL must be an integer"))?;
        }

        Ok(config)
    }

    fn validate(&self) -> McpResult<()> {
        if self.issuer.is_empty() {
            return Err(McpError::config("issuer is required"));
        }
        url::Url::parse(&self.issuer)
            .map_err(|_| McpError::config(format!("issuer '{}' is not a URL", self.issuer)))?;
        if self.session_secret.is_empty() {
            return Err(McpError::config("session_secret is required"));
        }
        if self.jwt_signing_secret.is_empty() {
            return Err(McpError::config("jwt_signing_secret is required"));
        }
        Ok(())
    }

    /// Callback URL the upstream provider redirects back to
    pub fn callback_url(&self) -> String {
        format!("{}/oauth/callback", self.issuer.trim_end_matches('/'))
    }
}

fn require_env(name: &str) -> McpResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| McpError::config(format!("missing required environment variable {name}")))
}

/// Decode the encryption key: exactly 32 bytes of hex
fn decode_encryption_secret(raw: &str) -> McpResult<[u8; 32]> {
    let bytes = hex::decode(raw.trim())
        .map_err(|_| McpError::config("jwt_encryption_secret must be hex"))?;
    bytes
        .try_into()
        .map_err(|_| McpError::config("jwt_encryption_secret must decode to exactly 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> UpstreamProviderConfig {
        UpstreamProviderConfig {
            authorization_endpoint: "https://idp.example/authorize".to_string(),
            token_endpoint: "https://idp.example/token".to_string(),
            client_id: "upstream-client".to_string(),
            client_secret: "upstream-secret".to_string(),
            scopes: vec!["read:user".to_string()],
            user_info_endpoint: None,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = OAuthConfig::new(
            "https://mcp.example",
            "session-secret",
            "signing-secret",
            &"ab".repeat(32),
            upstream(),
        )
        .unwrap();

        assert!(config.enable_dcr);
        assert_eq!(config.token_ttl_seconds, 3600);
        assert_eq!(config.refresh_token_ttl_seconds, 2_592_000);
        assert_eq!(config.callback_url(), "https://mcp.example/oauth/callback");
    }

    #[test]
    fn test_encryption_secret_must_be_32_bytes_hex() {
        let short = OAuthConfig::new(
            "https://mcp.example",
            "s",
            "k",
            "abcd",
            upstream(),
        );
        assert!(short.is_err());

        let not_hex = OAuthConfig::new(
            "https://mcp.example",
            "s",
            "k",
            &"zz".repeat(32),
            upstream(),
        );
        assert!(not_hex.is_err());
    }

    #[test]
    fn test_missing_secret_rejected() {
        let err = OAuthConfig::new(
            "https://mcp.example",
            "",
            "k",
            &"ab".repeat(32),
            upstream(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("session_secret"));
    }

    #[test]
    fn test_issuer_must_be_url() {
        let err = OAuthConfig::new("not a url", "s", "k", &"ab".repeat(32), upstream()).unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
