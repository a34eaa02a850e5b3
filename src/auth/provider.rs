//! Upstream identity provider client
//!
//! The authorization server federates to one upstream OAuth provider: it
//! redirects user agents to the upstream authorize endpoint, exchanges codes
//! and refresh tokens at the upstream token endpoint, and fetches user-info
//! when an endpoint is configured. User-info failures are best effort and
//! degrade to `sub:"unknown"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::auth::config::UpstreamProviderConfig;
use crate::core::error::{McpError, McpResult};

/// Timeout applied to every upstream call
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Token response from the upstream provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamTokens {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Identity attributes resolved from the upstream user-info endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            sub: "unknown".to_string(),
            name: None,
            email: None,
            picture: None,
        }
    }
}

/// HTTP client for the configured upstream provider
#[derive(Debug, Clone)]
pub struct UpstreamProvider {
    config: UpstreamProviderConfig,
    http: reqwest::Client,
}

impl UpstreamProvider {
    pub fn new(config: UpstreamProviderConfig) -> McpResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| McpError::Http(format!("failed to build upstream client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &UpstreamProviderConfig {
        &self.config
    }

    /// Build the upstream authorize URL the user agent is redirected to
    pub fn authorize_url(
        &self,
        callback_url: &str,
        state: &str,
        code_challenge: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.config.authorization_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(callback_url),
            urlencoding::encode(state),
        );
        if !self.config.scopes.is_empty() {
            url.push_str(&format!(
                "&scope={}",
                urlencoding::encode(&self.config.scopes.join(" "))
            ));
        }
        if let Some(challenge) = code_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=S256",
                urlencoding::encode(challenge)
            ));
        }
        url
    }

    /// Exchange an upstream authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> McpResult<UpstreamTokens> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        self.token_request(&form).await
    }

    /// Exchange an upstream refresh token for fresh tokens
    pub async fn refresh(&self, refresh_token: &str) -> McpResult<UpstreamTokens> {
        let form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        self.token_request(&form).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> McpResult<UpstreamTokens> {
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| McpError::Http(format!("upstream token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "upstream token endpoint rejected request");
            return Err(McpError::oauth(format!(
                "upstream token endpoint returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| McpError::oauth(format!("invalid upstream token response: {e}")))
    }

    /// Fetch user-info with the upstream access token. Best effort: a missing
    /// endpoint or any failure degrades to the default identity.
    pub async fn fetch_user_info(&self, access_token: &str) -> UserInfo {
        let Some(endpoint) = &self.config.user_info_endpoint else {
            return UserInfo::default();
        };

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await;

        let body: Value = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(error = %e, "user-info response unparseable");
                    return UserInfo::default();
                }
            },
            Ok(r) => {
                tracing::warn!(status = %r.status(), "user-info fetch failed");
                return UserInfo::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "user-info fetch failed");
                return UserInfo::default();
            }
        };

        // Providers disagree on the id field name (sub, id, login)
        let sub = body
            .get("sub")
            .or_else(|| body.get("id"))
            .or_else(|| body.get("login"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "unknown".to_string());

        UserInfo {
            sub,
            name: body.get("name").and_then(|v| v.as_str()).map(String::from),
            email: body.get("email").and_then(|v| v.as_str()).map(String::from),
            picture: body
                .get("picture")
                .or_else(|| body.get("avatar_url"))
                .and_then(|v| v.as_str())
                .map(String::from),
        }
    }
}
