//! Server layer: configuration, dispatch, sessions, and the HTTP front-end

pub mod config;
pub mod dispatcher;
pub mod http;
pub mod session;

pub use config::{CorsConfig, ServerConfig, init_logging, validate_port};
pub use dispatcher::Dispatcher;
pub use http::{
    McpHttpServer, McpHttpServerBuilder, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER,
};
pub use session::{DispatcherFactory, SessionManager, SessionTransport};
