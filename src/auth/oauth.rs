//! OAuth 2.1 authorization server with upstream federation
//!
//! Endpoints: server metadata, protected-resource metadata, dynamic client
//! registration (RFC 7591), authorize, callback, and token. The authorize
//! endpoint validates the client and PKCE challenge, records a pending
//! authorization under an HMAC-signed proxy state, and redirects the user
//! agent upstream. The callback exchanges the upstream code, mints a local
//! authorization code, and redirects back to the client, which then trades
//! the code (plus PKCE verifier) for a signed access token carrying the
//! encrypted upstream credential.
//!
//! Refresh grants federate too: the upstream refresh token is handed through
//! at issuance and re-exchanged upstream on refresh.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::auth::config::OAuthConfig;
use crate::auth::jwt::{MintRequest, TokenMinter};
use crate::auth::pkce::{self, CodeChallengeMethod, PkceParams};
use crate::auth::provider::{UpstreamProvider, UpstreamTokens, UserInfo};
use crate::auth::state::StateCodec;
use crate::core::error::McpResult;
use crate::storage::client_store::{ClientMetadata, ClientStore, InMemoryClientStore};

/// Lifetime of pending authorizations and pending token exchanges
const PENDING_TTL: Duration = Duration::from_secs(600);
/// Sweep cadence for the pending tables
const PENDING_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Sweep cadence for expired DCR clients
const CLIENT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Authorization recorded at the authorize endpoint, keyed by proxy state
#[derive(Debug, Clone)]
struct PendingAuthorization {
    client_id: String,
    client_redirect_uri: String,
    requested_scope: Option<String>,
    client_state: Option<String>,
    pkce_challenge: String,
    pkce_method: CodeChallengeMethod,
    upstream_code_verifier: Option<String>,
    resource: Option<String>,
    created_at: Instant,
}

/// Exchange recorded after the upstream callback, keyed by our code
#[derive(Debug, Clone)]
struct PendingExchange {
    client_id: String,
    redirect_uri: String,
    scope: Option<String>,
    resource: Option<String>,
    upstream_tokens: UpstreamTokens,
    user_info: UserInfo,
    pkce_challenge: String,
    pkce_method: CodeChallengeMethod,
    created_at: Instant,
}

/// OAuth error rendered as `{error, error_description}` with an HTTP status
#[derive(Debug, Clone)]
pub struct OAuthError {
    pub status: StatusCode,
    pub error: &'static str,
    pub description: String,
}

impl OAuthError {
    fn invalid_request<S: Into<String>>(description: S) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_request",
            description: description.into(),
        }
    }

    fn invalid_client<S: Into<String>>(description: S) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "invalid_client",
            description: description.into(),
        }
    }

    fn invalid_grant<S: Into<String>>(description: S) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_grant",
            description: description.into(),
        }
    }

    fn server_error<S: Into<String>>(description: S) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "server_error",
            description: description.into(),
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error,
            "error_description": self.description,
        });
        (self.status, Json(body)).into_response()
    }
}

/// The authorization server: endpoints plus the pending-flow tables
pub struct OAuthServer {
    config: OAuthConfig,
    clients: Arc<dyn ClientStore>,
    provider: UpstreamProvider,
    state_codec: StateCodec,
    minter: TokenMinter,
    pending_auth: Mutex<HashMap<String, PendingAuthorization>>,
    pending_exchange: Mutex<HashMap<String, PendingExchange>>,
}

impl OAuthServer {
    /// Build with the default in-memory client store
    pub fn new(config: OAuthConfig) -> McpResult<Arc<Self>> {
        let store = Arc::new(InMemoryClientStore::new(
            config.client_id_prefix.clone(),
            config.client_ttl_seconds,
        ));
        Self::with_client_store(config, store)
    }

    /// Build with a pluggable client store
    pub fn with_client_store(
        config: OAuthConfig,
        clients: Arc<dyn ClientStore>,
    ) -> McpResult<Arc<Self>> {
        let provider = UpstreamProvider::new(config.upstream.clone())?;
        let state_codec = StateCodec::new(config.session_secret.clone());
        let minter = TokenMinter::new(
            config.issuer.clone(),
            config.jwt_signing_secret.clone(),
            config.jwt_encryption_secret,
            config.token_ttl_seconds,
            config.token_mapper.clone(),
        );

        Ok(Arc::new(Self {
            config,
            clients,
            provider,
            state_codec,
            minter,
            pending_auth: Mutex::new(HashMap::new()),
            pending_exchange: Mutex::new(HashMap::new()),
        }))
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn client_store(&self) -> &Arc<dyn ClientStore> {
        &self.clients
    }

    /// Routes served by this authorization server
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(
                "/.well-known/oauth-authorization-server",
                get(handle_server_metadata),
            )
            .route(
                "/.well-known/oauth-protected-resource",
                get(handle_resource_metadata),
            )
            .route("/oauth/register", post(handle_register))
            .route("/oauth/authorize", get(handle_authorize))
            .route("/oauth/callback", get(handle_callback))
            .route("/oauth/token", post(handle_token))
            .with_state(self.clone())
    }

    /// Start the three janitor timers: pending authorizations, pending token
    /// exchanges, and expired DCR clients.
    pub fn spawn_janitors(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let auth_sweeper = {
            let server = self.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PENDING_SWEEP_INTERVAL);
                loop {
                    interval.tick().await;
                    let evicted = sweep(&server.pending_auth, |p| p.created_at).await;
                    if evicted > 0 {
                        tracing::warn!(evicted, "evicted expired pending authorizations");
                    }
                }
            })
        };

        let exchange_sweeper = {
            let server = self.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PENDING_SWEEP_INTERVAL);
                loop {
                    interval.tick().await;
                    let evicted = sweep(&server.pending_exchange, |p| p.created_at).await;
                    if evicted > 0 {
                        tracing::warn!(evicted, "evicted expired pending token exchanges");
                    }
                }
            })
        };

        let client_sweeper = {
            let server = self.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(CLIENT_SWEEP_INTERVAL);
                loop {
                    interval.tick().await;
                    match server.clients.sweep_expired().await {
                        Ok(evicted) if evicted > 0 => {
                            tracing::warn!(evicted, "evicted expired client registrations");
                        }
                        Ok(_) => {}
                        Err(error) => {
                            tracing::error!(error = %error, "client sweep failed");
                        }
                    }
                }
            })
        };

        vec![auth_sweeper, exchange_sweeper, client_sweeper]
    }

    /// Server metadata document (RFC 8414 shape)
    fn server_metadata(&self) -> Value {
        let issuer = self.config.issuer.trim_end_matches('/');
        let mut metadata = json!({
            "issuer": self.config.issuer,
            "authorization_endpoint": format!("{issuer}/oauth/authorize"),
            "token_endpoint": format!("{issuer}/oauth/token"),
            "scopes_supported": self.config.scopes_supported,
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code", "refresh_token"],
            "code_challenge_methods_supported": ["S256"],
            "token_endpoint_auth_methods_supported": [
                "client_secret_basic",
                "client_secret_post",
                "none"
            ],
        });
        if self.config.enable_dcr {
            metadata["registration_endpoint"] = json!(format!("{issuer}/oauth/register"));
        }
        metadata
    }

    /// Protected-resource metadata document (RFC 9728 shape)
    fn resource_metadata(&self) -> Value {
        json!({
            "resource": self.config.issuer,
            "authorization_servers": [self.config.issuer],
            "scopes_supported": self.config.scopes_supported,
            "bearer_methods_supported": ["header"],
        })
    }
}

impl std::fmt::Debug for OAuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthServer")
            .field("config", &self.config)
            .finish()
    }
}

/// Evict entries older than the pending TTL
async fn sweep<T>(
    table: &Mutex<HashMap<String, T>>,
    created_at: impl Fn(&T) -> Instant,
) -> usize {
    let mut table = table.lock().await;
    let before = table.len();
    table.retain(|_, entry| created_at(entry).elapsed() < PENDING_TTL);
    before - table.len()
}

/// 302 redirect
fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

/// Append query parameters to a redirect URI that may already carry some
fn redirect_with_params(base: &str, params: &[(&str, &str)]) -> String {
    let mut url = base.to_string();
    let mut separator = if base.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        url.push(separator);
        url.push_str(&format!("{key}={}", urlencoding::encode(value)));
        separator = '&';
    }
    url
}

/// Mint an opaque authorization code (32 bytes of hex)
fn mint_authorization_code() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn handle_server_metadata(State(server): State<Arc<OAuthServer>>) -> Json<Value> {
    Json(server.server_metadata())
}

async fn handle_resource_metadata(State(server): State<Arc<OAuthServer>>) -> Json<Value> {
    Json(server.resource_metadata())
}

async fn handle_register(
    State(server): State<Arc<OAuthServer>>,
    Json(metadata): Json<ClientMetadata>,
) -> Response {
    if !server.config.enable_dcr {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "invalid_request",
                "error_description": "dynamic client registration is disabled",
            })),
        )
            .into_response();
    }

    match server.clients.register(metadata).await {
        Ok(client) => {
            tracing::info!(client_id = %client.client_id, "client registered");
            let mut body = json!({
                "client_id": client.client_id,
                "client_id_issued_at": client.created_at.timestamp(),
                "redirect_uris": client.redirect_uris,
                "grant_types": client.grant_types,
                "response_types": client.response_types,
                "token_endpoint_auth_method": client.token_endpoint_auth_method,
            });
            if let Some(secret) = &client.client_secret {
                body["client_secret"] = json!(secret);
                body["client_secret_expires_at"] = match client.expires_at {
                    Some(at) => json!(at.timestamp()),
                    None => json!(0),
                };
            }
            if let Some(name) = &client.client_name {
                body["client_name"] = json!(name);
            }
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(error) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_client_metadata",
                "error_description": error.to_string(),
            })),
        )
            .into_response(),
    }
}

async fn handle_authorize(
    State(server): State<Arc<OAuthServer>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let client_id = params.get("client_id").map(String::as_str).unwrap_or("");
    let redirect_uri = params.get("redirect_uri").map(String::as_str).unwrap_or("");

    // Client identity and redirect URI must check out before anything is
    // reflected back to the redirect target
    let client = match server.clients.get(client_id).await {
        Ok(Some(client)) => client,
        _ => return OAuthError::invalid_request("unknown client_id").into_response(),
    };
    if redirect_uri.is_empty() || !client.redirect_uris.iter().any(|u| u == redirect_uri) {
        return OAuthError::invalid_request("redirect_uri does not match registration")
            .into_response();
    }

    let client_state = params.get("state").cloned();
    let redirect_error = |error: &str, description: &str| {
        let mut query = vec![("error", error), ("error_description", description)];
        if let Some(state) = client_state.as_deref() {
            query.push(("state", state));
        }
        found(&redirect_with_params(redirect_uri, &query))
    };

    if params.get("response_type").map(String::as_str) != Some("code") {
        return redirect_error("unsupported_response_type", "response_type must be code");
    }
    let Some(code_challenge) = params.get("code_challenge").filter(|c| !c.is_empty()) else {
        return redirect_error("invalid_request", "code_challenge is required");
    };
    match params
        .get("code_challenge_method")
        .and_then(|m| CodeChallengeMethod::parse(m))
    {
        Some(CodeChallengeMethod::S256) => {}
        _ => return redirect_error("invalid_request", "code_challenge_method must be S256"),
    }

    // Our own PKCE toward the upstream provider
    let upstream_pkce = PkceParams::new();
    let state = server.state_codec.issue();

    let pending = PendingAuthorization {
        client_id: client_id.to_string(),
        client_redirect_uri: redirect_uri.to_string(),
        requested_scope: params.get("scope").cloned(),
        client_state,
        pkce_challenge: code_challenge.clone(),
        pkce_method: CodeChallengeMethod::S256,
        upstream_code_verifier: Some(upstream_pkce.verifier.clone()),
        resource: params.get("resource").cloned(),
        created_at: Instant::now(),
    };
    server
        .pending_auth
        .lock()
        .await
        .insert(state.clone(), pending);

    let upstream_url = server.provider.authorize_url(
        &server.config.callback_url(),
        &state,
        Some(&upstream_pkce.challenge),
    );
    tracing::debug!(client_id = %client_id, "redirecting to upstream provider");
    found(&upstream_url)
}

async fn handle_callback(
    State(server): State<Arc<OAuthServer>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(state) = params.get("state") else {
        return OAuthError::invalid_request("missing state").into_response();
    };
    if !server.state_codec.verify(state) {
        return OAuthError::invalid_request("state signature invalid").into_response();
    }

    // One-shot consumption: the pending record is removed before use
    let Some(pending) = server.pending_auth.lock().await.remove(state) else {
        return OAuthError::invalid_request("unknown or expired state").into_response();
    };
    if pending.created_at.elapsed() >= PENDING_TTL {
        return OAuthError::invalid_request("authorization expired").into_response();
    }

    let client_redirect_uri = pending.client_redirect_uri.clone();
    let client_state = pending.client_state.clone();
    let client_redirect = move |query: &[(&str, &str)]| {
        let mut query = query.to_vec();
        if let Some(state) = client_state.as_deref() {
            query.push(("state", state));
        }
        found(&redirect_with_params(&client_redirect_uri, &query))
    };

    // Upstream denials are forwarded to the client
    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(String::as_str)
            .unwrap_or("upstream authorization failed");
        return client_redirect(&[("error", error), ("error_description", description)]);
    }

    let Some(code) = params.get("code") else {
        return client_redirect(&[("error", "invalid_request"), ("error_description", "missing code")]);
    };

    let upstream_tokens = match server
        .provider
        .exchange_code(
            code,
            &server.config.callback_url(),
            pending.upstream_code_verifier.as_deref(),
        )
        .await
    {
        Ok(tokens) => tokens,
        Err(error) => {
            tracing::error!(error = %error, "upstream code exchange failed");
            return client_redirect(&[
                ("error", "server_error"),
                ("error_description", "upstream token exchange failed"),
            ]);
        }
    };

    let user_info = server
        .provider
        .fetch_user_info(&upstream_tokens.access_token)
        .await;

    let code = mint_authorization_code();
    let exchange = PendingExchange {
        client_id: pending.client_id,
        redirect_uri: pending.client_redirect_uri.clone(),
        scope: pending.requested_scope,
        resource: pending.resource,
        upstream_tokens,
        user_info,
        pkce_challenge: pending.pkce_challenge,
        pkce_method: pending.pkce_method,
        created_at: Instant::now(),
    };
    server
        .pending_exchange
        .lock()
        .await
        .insert(code.clone(), exchange);

    client_redirect(&[("code", code.as_str())])
}

async fn handle_token(
    State(server): State<Arc<OAuthServer>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    match params.get("grant_type").map(String::as_str) {
        Some("authorization_code") => handle_authorization_code_grant(server, headers, params).await,
        Some("refresh_token") => handle_refresh_grant(server, headers, params).await,
        Some(_) => OAuthError {
            status: StatusCode::BAD_REQUEST,
            error: "unsupported_grant_type",
            description: "supported grant types: authorization_code, refresh_token".to_string(),
        }
        .into_response(),
        None => OAuthError::invalid_request("missing grant_type").into_response(),
    }
}

async fn handle_authorization_code_grant(
    server: Arc<OAuthServer>,
    headers: HeaderMap,
    params: HashMap<String, String>,
) -> Response {
    let client = match authenticate_client(&server, &headers, &params).await {
        Ok(client) => client,
        Err(error) => return error.into_response(),
    };

    let Some(code) = params.get("code") else {
        return OAuthError::invalid_request("missing code").into_response();
    };

    // Atomic removal enforces single use; a replayed code finds nothing
    let Some(exchange) = server.pending_exchange.lock().await.remove(code) else {
        return OAuthError::invalid_grant("unknown or already used code").into_response();
    };

    if exchange.created_at.elapsed() >= PENDING_TTL {
        return OAuthError::invalid_grant("code expired").into_response();
    }
    if exchange.client_id != client.client_id {
        return OAuthError::invalid_grant("code was issued to a different client").into_response();
    }
    match params.get("redirect_uri") {
        Some(uri) if *uri == exchange.redirect_uri => {}
        _ => return OAuthError::invalid_grant("redirect_uri mismatch").into_response(),
    }

    let Some(verifier) = params.get("code_verifier") else {
        return OAuthError::invalid_grant("missing code_verifier").into_response();
    };
    if !pkce::verify(verifier, &exchange.pkce_challenge, exchange.pkce_method) {
        return OAuthError::invalid_grant("PKCE verification failed").into_response();
    }

    issue_token_response(&server, &client.client_id, exchange).await
}

async fn handle_refresh_grant(
    server: Arc<OAuthServer>,
    headers: HeaderMap,
    params: HashMap<String, String>,
) -> Response {
    let client = match authenticate_client(&server, &headers, &params).await {
        Ok(client) => client,
        Err(error) => return error.into_response(),
    };

    let Some(refresh_token) = params.get("refresh_token") else {
        return OAuthError::invalid_request("missing refresh_token").into_response();
    };

    // Our refresh token is the upstream refresh token passed through
    let upstream_tokens = match server.provider.refresh(refresh_token).await {
        Ok(tokens) => tokens,
        Err(error) => {
            tracing::warn!(error = %error, "upstream refresh failed");
            return OAuthError::invalid_grant("refresh token rejected upstream").into_response();
        }
    };

    let user_info = server
        .provider
        .fetch_user_info(&upstream_tokens.access_token)
        .await;

    let exchange = PendingExchange {
        client_id: client.client_id.clone(),
        redirect_uri: String::new(),
        scope: params.get("scope").cloned(),
        resource: params.get("resource").cloned(),
        upstream_tokens,
        user_info,
        pkce_challenge: String::new(),
        pkce_method: CodeChallengeMethod::S256,
        created_at: Instant::now(),
    };

    issue_token_response(&server, &client.client_id, exchange).await
}

/// Mint the access token and render the RFC 6749 token response
async fn issue_token_response(
    server: &Arc<OAuthServer>,
    client_id: &str,
    exchange: PendingExchange,
) -> Response {
    let access_token = match server.minter.mint(
        &exchange.user_info,
        MintRequest {
            audience: exchange.resource.as_deref(),
            scope: exchange.scope.as_deref(),
            client_id: Some(client_id),
            upstream_access_token: Some(&exchange.upstream_tokens.access_token),
        },
    ) {
        Ok(token) => token,
        Err(error) => {
            tracing::error!(error = %error, "token minting failed");
            return OAuthError::server_error("token minting failed").into_response();
        }
    };

    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": server.minter.ttl_seconds(),
    });
    if let Some(scope) = &exchange.scope {
        body["scope"] = json!(scope);
    }
    if let Some(refresh_token) = &exchange.upstream_tokens.refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }

    tracing::info!(client_id = %client_id, sub = %exchange.user_info.sub, "access token issued");
    (StatusCode::OK, Json(body)).into_response()
}

/// Authenticate the client per its registered token-endpoint auth method:
/// `client_secret_basic` via the Authorization header, `client_secret_post`
/// via body parameters, or `none` for public clients.
async fn authenticate_client(
    server: &Arc<OAuthServer>,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<crate::storage::client_store::ClientRegistration, OAuthError> {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth);

    let (client_id, client_secret) = match &basic {
        Some((id, secret)) => (id.as_str(), Some(secret.as_str())),
        None => {
            let id = params
                .get("client_id")
                .map(String::as_str)
                .ok_or_else(|| OAuthError::invalid_client("missing client credentials"))?;
            (id, params.get("client_secret").map(String::as_str))
        }
    };

    server
        .clients
        .validate(client_id, client_secret)
        .await
        .map_err(|error| OAuthError::invalid_client(error.to_string()))
}

/// Decode `Authorization: Basic base64(id:secret)`
fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((
        urlencoding::decode(id).ok()?.into_owned(),
        urlencoding::decode(secret).ok()?.into_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::UpstreamProviderConfig;

    fn config() -> OAuthConfig {
        OAuthConfig::new(
            "https://mcp.example",
            "session-secret",
            "signing-secret",
            &"ab".repeat(32),
            UpstreamProviderConfig {
                authorization_endpoint: "https://idp.example/authorize".to_string(),
                token_endpoint: "https://idp.example/token".to_string(),
                client_id: "upstream-client".to_string(),
                client_secret: "upstream-secret".to_string(),
                scopes: vec![],
                user_info_endpoint: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_server_metadata_shape() {
        let server = OAuthServer::new(config()).unwrap();
        let metadata = server.server_metadata();

        assert_eq!(metadata["issuer"], "https://mcp.example");
        assert_eq!(
            metadata["authorization_endpoint"],
            "https://mcp.example/oauth/authorize"
        );
        assert_eq!(metadata["response_types_supported"], json!(["code"]));
        assert_eq!(
            metadata["grant_types_supported"],
            json!(["authorization_code", "refresh_token"])
        );
        assert_eq!(metadata["code_challenge_methods_supported"], json!(["S256"]));
        assert_eq!(
            metadata["registration_endpoint"],
            "https://mcp.example/oauth/register"
        );
    }

    #[test]
    fn test_metadata_without_dcr() {
        let mut config = config();
        config.enable_dcr = false;
        let server = OAuthServer::new(config).unwrap();
        assert!(server.server_metadata().get("registration_endpoint").is_none());
    }

    #[test]
    fn test_resource_metadata_shape() {
        let server = OAuthServer::new(config()).unwrap();
        let metadata = server.resource_metadata();
        assert_eq!(metadata["resource"], "https://mcp.example");
        assert_eq!(metadata["authorization_servers"], json!(["https://mcp.example"]));
        assert_eq!(metadata["bearer_methods_supported"], json!(["header"]));
    }

    #[test]
    fn test_parse_basic_auth() {
        let encoded = BASE64.encode("client-1:s3cret");
        let (id, secret) = parse_basic_auth(&format!("Basic {encoded}")).unwrap();
        assert_eq!(id, "client-1");
        assert_eq!(secret, "s3cret");

        assert!(parse_basic_auth("Bearer abc").is_none());
        assert!(parse_basic_auth("Basic not-base64!!").is_none());
    }

    #[test]
    fn test_redirect_with_params() {
        assert_eq!(
            redirect_with_params("https://app.example/cb", &[("code", "a b")]),
            "https://app.example/cb?code=a%20b"
        );
        assert_eq!(
            redirect_with_params("https://app.example/cb?x=1", &[("code", "c")]),
            "https://app.example/cb?x=1&code=c"
        );
    }

    #[test]
    fn test_authorization_code_entropy() {
        let a = mint_authorization_code();
        let b = mint_authorization_code();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_pending_sweep() {
        // Backdating needs the monotonic clock to be at least one TTL old
        let Some(stale) = Instant::now().checked_sub(PENDING_TTL) else {
            return;
        };

        let server = OAuthServer::new(config()).unwrap();
        server.pending_auth.lock().await.insert(
            "stale".to_string(),
            PendingAuthorization {
                client_id: "c".to_string(),
                client_redirect_uri: "https://app.example/cb".to_string(),
                requested_scope: None,
                client_state: None,
                pkce_challenge: "x".to_string(),
                pkce_method: CodeChallengeMethod::S256,
                upstream_code_verifier: None,
                resource: None,
                created_at: stale,
            },
        );
        server.pending_auth.lock().await.insert(
            "fresh".to_string(),
            PendingAuthorization {
                client_id: "c".to_string(),
                client_redirect_uri: "https://app.example/cb".to_string(),
                requested_scope: None,
                client_state: None,
                pkce_challenge: "x".to_string(),
                pkce_method: CodeChallengeMethod::S256,
                upstream_code_verifier: None,
                resource: None,
                created_at: Instant::now(),
            },
        );

        let evicted = sweep(&server.pending_auth, |p| p.created_at).await;
        assert_eq!(evicted, 1);
        assert!(server.pending_auth.lock().await.contains_key("fresh"));
    }
}
