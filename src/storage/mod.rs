//! Pluggable storage interfaces with in-memory defaults
//!
//! Three families: session metadata, client-side token records, and DCR
//! client registrations. Replacing any of them with a Redis/database/keychain
//! backend never touches the core.

pub mod client_store;
pub mod session_store;
pub mod token_store;

pub use client_store::{ClientMetadata, ClientRegistration, ClientStore, InMemoryClientStore};
pub use session_store::{InMemorySessionStore, SessionRecord, SessionStore};
pub use token_store::{
    FileTokenStore, InMemoryTokenStore, StoredTokens, TokenRecord, TokenStore, normalize_server_url,
};
