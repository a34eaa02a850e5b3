//! HTTP front-end for the Streamable HTTP binding
//!
//! One RPC path (`/mcp`) accepts POST for JSON-RPC frames and DELETE for
//! explicit session close; `/health` reports uptime and live session count.
//! The builder wires the capability registry, session store, optional OAuth
//! authorization server routes, and optional bearer-token verification into
//! one axum router.
//!
//! Port binding walks up to 20 sequential ports and writes the effective
//! port back to `MCP_PORT`. Shutdown closes live transports and force-exits
//! after five seconds if the graceful path stalls.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::auth::oauth::OAuthServer;
use crate::auth::verifier::{TokenVerifier, www_authenticate};
use crate::core::context::RequestContext;
use crate::core::error::{McpError, McpResult};
use crate::core::registry::{CapabilityRegistry, ServiceDef};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, error_codes};
use crate::server::config::{CorsConfig, ServerConfig};
use crate::server::dispatcher::Dispatcher;
use crate::server::session::SessionManager;
use crate::storage::session_store::{InMemorySessionStore, SessionStore};

/// Session id header of the Streamable HTTP binding
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
/// Protocol version header of the Streamable HTTP binding
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// How many sequential ports to try past the configured one
const PORT_RETRIES: u16 = 20;
/// Grace period before a stalled shutdown force-exits
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Cadence of the expired-session sweep
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Bearer-token enforcement settings for the RPC path
#[derive(Clone)]
struct AuthLayer {
    verifier: Arc<TokenVerifier>,
    /// Audience the token must carry (the canonical resource identifier)
    audience: String,
    /// Advertised in `WWW-Authenticate` on 401
    resource_metadata_url: String,
}

struct AppState {
    config: ServerConfig,
    sessions: Arc<SessionManager>,
    started_at: Instant,
    auth: Option<AuthLayer>,
}

/// Builder for [`McpHttpServer`]
pub struct McpHttpServerBuilder {
    config: ServerConfig,
    registry: CapabilityRegistry,
    session_store: Option<Arc<dyn SessionStore>>,
    oauth: Option<Arc<OAuthServer>>,
    auth: Option<AuthLayer>,
}

impl McpHttpServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: CapabilityRegistry::new(),
            session_store: None,
            oauth: None,
            auth: None,
        }
    }

    /// Register a service's capabilities
    pub fn register_service(mut self, service: ServiceDef) -> Self {
        self.registry.register_service(service);
        self
    }

    /// Replace the default in-memory session store
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Mount an OAuth authorization server's routes and require bearer
    /// tokens it issues on the RPC path
    pub fn oauth(mut self, oauth: Arc<OAuthServer>) -> Self {
        let config = oauth.config();
        let issuer = config.issuer.trim_end_matches('/').to_string();
        let verifier = TokenVerifier::new(config.jwt_signing_secret.clone(), config.issuer.clone())
            .with_encryption_key(config.jwt_encryption_secret);
        self.auth = Some(AuthLayer {
            verifier: Arc::new(verifier),
            audience: config.issuer.clone(),
            resource_metadata_url: format!("{issuer}/.well-known/oauth-protected-resource"),
        });
        self.oauth = Some(oauth);
        self
    }

    /// Require bearer tokens on the RPC path without mounting issuance
    /// routes (resource-server-only deployments)
    pub fn token_verifier(
        mut self,
        verifier: TokenVerifier,
        audience: impl Into<String>,
        resource_metadata_url: impl Into<String>,
    ) -> Self {
        self.auth = Some(AuthLayer {
            verifier: Arc::new(verifier),
            audience: audience.into(),
            resource_metadata_url: resource_metadata_url.into(),
        });
        self
    }

    pub fn build(self) -> McpResult<McpHttpServer> {
        let registry = Arc::new(self.registry);
        let name = self.config.name.clone();
        let version = self.config.version.clone();
        let factory = {
            let registry = registry.clone();
            Arc::new(move || Dispatcher::new(name.clone(), version.clone(), registry.clone()))
        };

        let store: Arc<dyn SessionStore> = self
            .session_store
            .unwrap_or_else(|| Arc::new(InMemorySessionStore::new()));
        let sessions = Arc::new(SessionManager::new(factory, store.clone()));

        let state = Arc::new(AppState {
            config: self.config.clone(),
            sessions: sessions.clone(),
            started_at: Instant::now(),
            auth: self.auth,
        });

        let mut router = Router::new()
            .route("/mcp", post(handle_mcp_post).delete(handle_mcp_delete))
            .route("/health", get(handle_health))
            .with_state(state);

        if let Some(oauth) = &self.oauth {
            router = router.merge(oauth.router());
        }
        if self.config.cors.enabled {
            let cors = build_cors_layer(&self.config.cors)?;
            router = router.layer(tower::ServiceBuilder::new().layer(cors).into_inner());
        }

        Ok(McpHttpServer {
            config: self.config,
            router,
            sessions,
            session_store: store,
            oauth: self.oauth,
        })
    }
}

/// An assembled MCP server ready to bind
pub struct McpHttpServer {
    config: ServerConfig,
    router: Router,
    sessions: Arc<SessionManager>,
    session_store: Arc<dyn SessionStore>,
    oauth: Option<Arc<OAuthServer>>,
}

impl McpHttpServer {
    pub fn builder(config: ServerConfig) -> McpHttpServerBuilder {
        McpHttpServerBuilder::new(config)
    }

    /// The assembled router, for embedding or tests
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Start the janitors owned by this server: expired-session sweep plus
    /// the OAuth pending-table and client sweeps when issuance is mounted.
    pub fn spawn_janitors(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let store = self.session_store.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                match store.sweep_expired().await {
                    Ok(evicted) if evicted > 0 => {
                        tracing::warn!(evicted, "evicted expired sessions");
                    }
                    Ok(_) => {}
                    Err(error) => tracing::error!(error = %error, "session sweep failed"),
                }
            }
        }));

        if let Some(oauth) = &self.oauth {
            handles.extend(oauth.spawn_janitors());
        }

        handles
    }

    /// Bind (with port retry) and run until a shutdown signal.
    ///
    /// Returns once graceful shutdown completes; a stalled shutdown
    /// force-exits the process with code 1 after five seconds.
    pub async fn serve(self) -> McpResult<()> {
        let janitors = self.spawn_janitors();
        let listener = bind_with_retry(self.config.port).await?;
        let local = listener
            .local_addr()
            .map_err(|e| McpError::Http(format!("listener address unavailable: {e}")))?;
        tracing::info!(name = %self.config.name, addr = %local, "MCP server listening");

        let sessions = self.sessions.clone();
        let shutdown = async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received, closing sessions");
            sessions.close_all().await;
            tokio::spawn(async {
                tokio::time::sleep(SHUTDOWN_GRACE).await;
                tracing::error!("graceful shutdown timed out, forcing exit");
                std::process::exit(1);
            });
        };

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| McpError::Http(format!("server error: {e}")));

        for janitor in janitors {
            janitor.abort();
        }
        result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Bind the configured port, retrying the next 19 sequential ports. The
/// effective port is written back to `MCP_PORT`.
async fn bind_with_retry(port: u16) -> McpResult<TcpListener> {
    for offset in 0..PORT_RETRIES {
        let candidate = port
            .checked_add(offset)
            .ok_or_else(|| McpError::config("port range exceeds 65535"))?;
        match TcpListener::bind(("0.0.0.0", candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!(requested = port, effective = candidate, "port in use, moved");
                }
                // std::env::set_var is unsafe in edition 2024; single-threaded
                // startup is the only writer
                unsafe { std::env::set_var("MCP_PORT", candidate.to_string()) };
                return Ok(listener);
            }
            Err(error) => {
                tracing::warn!(port = candidate, error = %error, "bind failed");
            }
        }
    }
    Err(McpError::Http(format!(
        "no free port in range {port}-{}",
        port.saturating_add(PORT_RETRIES - 1)
    )))
}

/// CORS layer from explicit configuration. Only ever installed when enabled.
fn build_cors_layer(config: &CorsConfig) -> McpResult<CorsLayer> {
    use axum::http::HeaderName;

    let mut origins = Vec::with_capacity(config.origins.len());
    for origin in &config.origins {
        if origin.contains(char::is_whitespace) || origin.is_empty() {
            return Err(McpError::config(format!("invalid CORS origin '{origin}'")));
        }
        let value = origin
            .parse::<HeaderValue>()
            .map_err(|_| McpError::config(format!("invalid CORS origin '{origin}'")))?;
        origins.push(value);
    }

    let session_id = HeaderName::from_static(SESSION_ID_HEADER);
    let protocol_version = HeaderName::from_static(PROTOCOL_VERSION_HEADER);

    let layer = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            session_id.clone(),
            protocol_version,
        ])
        .expose_headers([session_id, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(86_400))
        .allow_credentials(config.allow_credentials);

    Ok(layer)
}

// ============================================================================
// Route Handlers
// ============================================================================

fn protocol_error(message: &str) -> Response {
    let error = JsonRpcError::error(
        Value::Null,
        error_codes::BAD_REQUEST,
        message.to_string(),
        None,
    );
    (StatusCode::OK, Json(error)).into_response()
}

fn parse_error() -> Response {
    let error = JsonRpcError::error(
        Value::Null,
        error_codes::PARSE_ERROR,
        "Parse error".to_string(),
        None,
    );
    (StatusCode::OK, Json(error)).into_response()
}

/// Authenticate the request when a verifier is configured
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<RequestContext, Response> {
    let Some(auth) = &state.auth else {
        return Ok(RequestContext::new());
    };

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        let challenge = www_authenticate(&auth.resource_metadata_url, None, None);
        return Err(unauthorized(challenge, "missing bearer token"));
    };

    match auth.verifier.verify(token, &auth.audience) {
        Ok(verified) => Ok(RequestContext::new().with_auth(verified)),
        Err(failure) => {
            let challenge = www_authenticate(&auth.resource_metadata_url, Some(&failure), None);
            Err(unauthorized(challenge, &failure.error))
        }
    }
}

fn unauthorized(challenge: String, description: &str) -> Response {
    let header_value = HeaderValue::from_str(&challenge)
        .unwrap_or_else(|_| HeaderValue::from_static("Bearer"));
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, header_value)],
        Json(json!({
            "error": "unauthorized",
            "error_description": description,
        })),
    )
        .into_response()
}

async fn handle_mcp_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let context = match authenticate(&state, &headers) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let Ok(request) = serde_json::from_slice::<JsonRpcRequest>(&body) else {
        return parse_error();
    };

    let session_header = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let is_initialize = request.method == crate::protocol::methods::INITIALIZE;

    let (transport, new_session) = match (&session_header, is_initialize) {
        // Initialize without a session header creates the session
        (None, true) => match state.sessions.create_session().await {
            Ok(transport) => (transport, true),
            Err(error) => {
                tracing::error!(error = %error, "session creation failed");
                return protocol_error("session creation failed");
            }
        },
        (Some(id), _) => match state.sessions.resolve(id).await {
            Ok(transport) => (transport, false),
            Err(_) => return protocol_error("Bad Request: unknown session"),
        },
        (None, false) => {
            return protocol_error("Bad Request: missing session id");
        }
    };

    if is_initialize {
        transport.mark_initialized();
    }

    let response = transport.handle(request, context).await;

    let mut http_response = match response {
        Some(message) => (StatusCode::OK, Json(message)).into_response(),
        // Notifications are accepted without a body
        None => StatusCode::ACCEPTED.into_response(),
    };

    if new_session {
        if let Ok(value) = HeaderValue::from_str(transport.id()) {
            http_response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
    }
    http_response
}

async fn handle_mcp_delete(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(id) = headers.get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok()) else {
        return protocol_error("Bad Request: missing session id");
    };

    match state.sessions.close_session(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => protocol_error("Bad Request: unknown session"),
        Err(error) => {
            tracing::error!(error = %error, "session close failed");
            protocol_error("session close failed")
        }
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": state.config.name,
        "version": state.config.version,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "sessions": state.sessions.session_count().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        let config = CorsConfig::allow_origins(["not an origin\n"]);
        assert!(build_cors_layer(&config).is_err());

        let config = CorsConfig::allow_origins(["https://app.example"]);
        assert!(build_cors_layer(&config).is_ok());
    }

    #[test]
    fn test_header_names() {
        assert_eq!(SESSION_ID_HEADER, "mcp-session-id");
        assert_eq!(PROTOCOL_VERSION_HEADER, "mcp-protocol-version");
    }
}
