//! OAuth 2.1 authorization server, token minting, and verification
//!
//! Issuance side: [`oauth::OAuthServer`] implements dynamic client
//! registration, the PKCE-enforced authorization-code flow federated to an
//! upstream identity provider, and refresh via upstream passthrough.
//! Resource-server side: [`verifier::TokenVerifier`] checks the HS256
//! signature and claims and surfaces the decrypted upstream credential to
//! handlers.

pub mod config;
pub mod jwt;
pub mod oauth;
pub mod pkce;
pub mod provider;
pub mod state;
pub mod verifier;

pub use config::{OAuthConfig, TokenMapper, UpstreamProviderConfig};
pub use jwt::{EncryptedToken, MintRequest, TokenMinter, decrypt_upstream_token, encrypt_upstream_token};
pub use oauth::{OAuthError, OAuthServer};
pub use provider::{UpstreamProvider, UpstreamTokens, UserInfo};
pub use verifier::{
    TokenVerifier, VerificationFailure, VerifyErrorCode, auth_error_payload, www_authenticate,
};
