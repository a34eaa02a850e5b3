// Copyright (c) 2025 Beacon MCP Contributors
// SPDX-License-Identifier: MIT

//! # beacon-mcp
//!
//! A framework for building [Model Context Protocol](https://modelcontextprotocol.io/)
//! servers over the Streamable HTTP binding, with batteries for real
//! deployments:
//!
//! - **Capability registry and dispatch**: declare tools, resources, and
//!   prompts on service definitions; input schemas are generated from typed
//!   field descriptors and arguments are validated before your handler runs.
//! - **Sessions**: per-client transports keyed by an opaque session header,
//!   with a pluggable store so sessions survive restarts behind a load
//!   balancer.
//! - **OAuth 2.1**: a built-in authorization server federating to an
//!   upstream identity provider: dynamic client registration, PKCE-enforced
//!   authorization code flow, and stateless HS256 access tokens that carry
//!   the upstream credential AES-256-GCM-encrypted under a separate key.
//! - **Elicitation**: tools can suspend dispatch and return a form
//!   describing missing inputs instead of failing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beacon_mcp::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let service = ServiceDef::new("GreeterService").tool(
//!         ToolDef::new(
//!             "greet",
//!             FnToolHandler(|arguments: HashMap<String, Value>, _ctx| async move {
//!                 let name = arguments
//!                     .get("name")
//!                     .and_then(|v| v.as_str())
//!                     .unwrap_or("world");
//!                 Ok(json!(format!("Hello, {name}!")))
//!             }),
//!         )
//!         .description("Greet someone")
//!         .input(InputType::new("GreetInput").field(Field::string("name"))),
//!     );
//!
//!     McpHttpServer::builder(ServerConfig::new("greeter", "1.0.0"))
//!         .register_service(service)
//!         .build()?
//!         .serve()
//!         .await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: errors, schema generation, validation, elicitation, registry
//! - [`protocol`]: JSON-RPC envelope and MCP wire types
//! - [`server`]: dispatcher, session manager, HTTP front-end
//! - [`auth`]: OAuth authorization server, token minting, verification
//! - [`storage`]: pluggable session/token/client stores

pub mod auth;
pub mod core;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::core::error::{McpError, McpResult};
pub use crate::protocol::types::*;

/// Prelude module for convenient imports
///
/// Use `use beacon_mcp::prelude::*;` to pull in everything a typical server
/// needs.
pub mod prelude {
    // Core types and traits
    pub use crate::core::{
        context::{RequestContext, VerifiedAuth},
        elicitation::{ElicitField, ElicitationConfig, ElicitationPlan, FormDef},
        error::{McpError, McpResult},
        prompt::{FnPromptHandler, PromptHandler},
        registry::{CapabilityRegistry, PromptDef, ResourceDef, ServiceDef, ToolDef},
        resource::{FnResourceHandler, ResourceHandler},
        schema::{Field, FieldType, InputType},
        tool::{FnToolHandler, ToolHandler},
    };

    // Protocol types
    pub use crate::protocol::methods;
    pub use crate::protocol::types::*;

    // Server and configuration
    pub use crate::server::{
        CorsConfig, McpHttpServer, SESSION_ID_HEADER, ServerConfig, init_logging,
    };

    // Authorization
    pub use crate::auth::{OAuthConfig, OAuthServer, TokenVerifier, UpstreamProviderConfig};

    // Storage
    pub use crate::storage::{
        ClientStore, FileTokenStore, InMemoryClientStore, InMemorySessionStore,
        InMemoryTokenStore, SessionStore, TokenStore,
    };

    // Essential external types
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::collections::HashMap;
    pub use std::sync::Arc;
}
