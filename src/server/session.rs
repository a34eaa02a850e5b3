//! Session management for the Streamable HTTP binding
//!
//! A session represents one initialized MCP client. The manager allocates
//! opaque UUID session ids, binds each to a transport wrapping a dispatcher,
//! writes metadata through the pluggable [`SessionStore`], and recreates
//! transports on demand when a known session id arrives at a fresh process
//! (load balancer failover, container restart).
//!
//! Within one session requests are serialized in arrival order; across
//! sessions there is no ordering.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::core::context::RequestContext;
use crate::core::error::{McpError, McpResult};
use crate::protocol::types::{JsonRpcMessage, JsonRpcRequest};
use crate::server::dispatcher::Dispatcher;
use crate::storage::session_store::SessionStore;

/// Builds a fresh dispatcher (server instance) for a new or recovered session
pub type DispatcherFactory = Arc<dyn Fn() -> Dispatcher + Send + Sync>;

/// Server-side transport for one session
pub struct SessionTransport {
    id: String,
    dispatcher: Dispatcher,
    /// Serializes request handling within the session
    serializer: Mutex<()>,
    initialized: AtomicBool,
}

impl SessionTransport {
    fn new(id: String, dispatcher: Dispatcher, initialized: bool) -> Self {
        Self {
            id,
            dispatcher,
            serializer: Mutex::new(()),
            initialized: AtomicBool::new(initialized),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Handle one frame on this session, preserving arrival order
    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        context: RequestContext,
    ) -> Option<JsonRpcMessage> {
        let _ordering = self.serializer.lock().await;
        let context = context.with_session(self.id.clone());
        self.dispatcher.handle_request(request, context).await
    }

    /// Close callback; nothing to tear down for the HTTP binding beyond
    /// logging, but the hook mirrors the shutdown path.
    pub fn close(&self) {
        tracing::info!(session_id = %self.id, "session transport closed");
    }
}

/// Allocates, resolves, and closes sessions
pub struct SessionManager {
    transports: RwLock<HashMap<String, Arc<SessionTransport>>>,
    store: Arc<dyn SessionStore>,
    factory: DispatcherFactory,
}

impl SessionManager {
    pub fn new(factory: DispatcherFactory, store: Arc<dyn SessionStore>) -> Self {
        Self {
            transports: RwLock::new(HashMap::new()),
            store,
            factory,
        }
    }

    /// Create a new session: allocate a UUID, bind a transport, persist
    /// metadata. Driven by an initialize request arriving without a session
    /// header.
    pub async fn create_session(&self) -> McpResult<Arc<SessionTransport>> {
        let id = Uuid::new_v4().to_string();
        let transport = Arc::new(SessionTransport::new(id.clone(), (self.factory)(), false));

        self.store
            .create(&id, Some(json!({"initialized": true})))
            .await?;
        self.transports
            .write()
            .await
            .insert(id.clone(), transport.clone());

        tracing::info!(session_id = %id, "session created");
        Ok(transport)
    }

    /// Resolve a session id to its transport.
    ///
    /// Falls back to recreate-on-demand: an id absent from the in-memory
    /// table but present in the persistent store gets a fresh transport with
    /// the same id, already marked initialized so the client is not forced to
    /// re-initialize.
    pub async fn resolve(&self, id: &str) -> McpResult<Arc<SessionTransport>> {
        if let Some(transport) = self.transports.read().await.get(id) {
            return Ok(transport.clone());
        }

        if !self.store.exists(id).await? {
            return Err(McpError::session(format!("unknown session: {id}")));
        }

        let mut transports = self.transports.write().await;
        // Racing resolvers: first writer wins, later ones reuse its transport
        if let Some(transport) = transports.get(id) {
            return Ok(transport.clone());
        }

        let transport = Arc::new(SessionTransport::new(
            id.to_string(),
            (self.factory)(),
            true,
        ));
        transports.insert(id.to_string(), transport.clone());
        tracing::info!(session_id = %id, "session transport recreated from store");
        Ok(transport)
    }

    /// Close a session: close the transport and remove both entries
    pub async fn close_session(&self, id: &str) -> McpResult<bool> {
        let transport = self.transports.write().await.remove(id);
        let known = transport.is_some() || self.store.exists(id).await?;

        if let Some(transport) = transport {
            transport.close();
        }
        self.store.delete(id).await?;

        if known {
            tracing::info!(session_id = %id, "session deleted");
        }
        Ok(known)
    }

    /// Number of sessions with a live in-memory transport
    pub async fn session_count(&self) -> usize {
        self.transports.read().await.len()
    }

    /// Close every live transport (shutdown path, best effort)
    pub async fn close_all(&self) {
        let mut transports = self.transports.write().await;
        for (_, transport) in transports.drain() {
            transport.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::CapabilityRegistry;
    use crate::protocol::methods;
    use crate::storage::session_store::InMemorySessionStore;
    use serde_json::Value;

    fn factory() -> DispatcherFactory {
        let registry = Arc::new(CapabilityRegistry::new());
        Arc::new(move || {
            Dispatcher::new("test".to_string(), "0.0.0".to_string(), registry.clone())
        })
    }

    fn manager_with(store: Arc<dyn SessionStore>) -> SessionManager {
        SessionManager::new(factory(), store)
    }

    #[tokio::test]
    async fn test_create_and_resolve() {
        let manager = manager_with(Arc::new(InMemorySessionStore::new()));
        let transport = manager.create_session().await.unwrap();
        assert!(!transport.is_initialized());

        let resolved = manager.resolve(transport.id()).await.unwrap();
        assert_eq!(resolved.id(), transport.id());
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let manager = manager_with(Arc::new(InMemorySessionStore::new()));
        let err = match manager.resolve("not-a-session").await {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail for unknown session"),
        };
        assert_eq!(err.category(), "session");
    }

    #[tokio::test]
    async fn test_close_removes_both_entries() {
        let manager = manager_with(Arc::new(InMemorySessionStore::new()));
        let transport = manager.create_session().await.unwrap();
        let id = transport.id().to_string();

        assert!(manager.close_session(&id).await.unwrap());
        assert_eq!(manager.session_count().await, 0);
        assert!(manager.resolve(&id).await.is_err());
        // Second delete reports unknown
        assert!(!manager.close_session(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_recreate_on_demand_from_shared_store() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

        // First "process" creates the session
        let first = manager_with(store.clone());
        let id = first.create_session().await.unwrap().id().to_string();

        // Second "process" shares only the store
        let second = manager_with(store.clone());
        assert_eq!(second.session_count().await, 0);

        let recovered = second.resolve(&id).await.unwrap();
        assert_eq!(recovered.id(), id);
        // Recovered transports skip re-initialization
        assert!(recovered.is_initialized());
        assert_eq!(second.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_transport_dispatches() {
        let manager = manager_with(Arc::new(InMemorySessionStore::new()));
        let transport = manager.create_session().await.unwrap();

        let response = transport
            .handle(
                JsonRpcRequest {
                    jsonrpc: "2.0".to_string(),
                    id: serde_json::json!(1),
                    method: methods::PING.to_string(),
                    params: None,
                },
                RequestContext::new(),
            )
            .await
            .unwrap();

        match response {
            JsonRpcMessage::Response(r) => assert_eq!(r.result, Some(Value::Object(Default::default()))),
            other => panic!("expected response, got {other:?}"),
        }
    }
}
