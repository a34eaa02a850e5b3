//! Access-token minting: HS256 JWTs with an envelope-encrypted upstream
//! credential
//!
//! The upstream provider's access token is placed into the `upstream_token`
//! claim as `{ciphertext, iv, tag}`, AES-256-GCM under a 32-byte key that is
//! independent of the signing secret. Holders of the signing key can verify
//! tokens without being able to read the upstream credential.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::auth::config::TokenMapper;
use crate::auth::provider::UserInfo;
use crate::core::error::{McpError, McpResult};

/// Encrypted upstream credential carried in the `upstream_token` claim
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncryptedToken {
    /// Base64 ciphertext (without the tag)
    pub ciphertext: String,
    /// Base64 12-byte random IV
    pub iv: String,
    /// Base64 16-byte GCM authentication tag
    pub tag: String,
}

const GCM_TAG_LEN: usize = 16;
const GCM_IV_LEN: usize = 12;

/// Encrypt an upstream token under the 32-byte encryption key
pub fn encrypt_upstream_token(key: &[u8; 32], plaintext: &str) -> McpResult<EncryptedToken> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut iv = [0u8; GCM_IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    // aes-gcm appends the tag to the ciphertext; the claim carries them apart
    let mut combined = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| McpError::internal("upstream token encryption failed"))?;
    let tag = combined.split_off(combined.len() - GCM_TAG_LEN);

    Ok(EncryptedToken {
        ciphertext: BASE64.encode(&combined),
        iv: BASE64.encode(iv),
        tag: BASE64.encode(tag),
    })
}

/// Decrypt an `upstream_token` claim. Authentication-tag failures (wrong key,
/// tampered ciphertext) surface as an auth error.
pub fn decrypt_upstream_token(key: &[u8; 32], token: &EncryptedToken) -> McpResult<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let iv = BASE64
        .decode(&token.iv)
        .map_err(|_| McpError::auth("upstream_token iv is not base64"))?;
    if iv.len() != GCM_IV_LEN {
        return Err(McpError::auth("upstream_token iv must be 12 bytes"));
    }
    let mut combined = BASE64
        .decode(&token.ciphertext)
        .map_err(|_| McpError::auth("upstream_token ciphertext is not base64"))?;
    let tag = BASE64
        .decode(&token.tag)
        .map_err(|_| McpError::auth("upstream_token tag is not base64"))?;
    combined.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), combined.as_ref())
        .map_err(|_| McpError::auth("upstream_token authentication failed"))?;

    String::from_utf8(plaintext).map_err(|_| McpError::auth("upstream_token is not UTF-8"))
}

/// Inputs for one minting operation
#[derive(Debug, Clone, Default)]
pub struct MintRequest<'a> {
    /// Audience; falls back to the issuer when absent
    pub audience: Option<&'a str>,
    pub scope: Option<&'a str>,
    pub client_id: Option<&'a str>,
    pub upstream_access_token: Option<&'a str>,
}

/// Mints access tokens for the authorization server
#[derive(Clone)]
pub struct TokenMinter {
    issuer: String,
    signing_secret: String,
    encryption_key: [u8; 32],
    ttl_seconds: u64,
    mapper: Option<TokenMapper>,
}

impl TokenMinter {
    pub fn new(
        issuer: String,
        signing_secret: String,
        encryption_key: [u8; 32],
        ttl_seconds: u64,
        mapper: Option<TokenMapper>,
    ) -> Self {
        Self {
            issuer,
            signing_secret,
            encryption_key,
            ttl_seconds,
            mapper,
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Mint a signed access token for the given user
    pub fn mint(&self, user: &UserInfo, request: MintRequest<'_>) -> McpResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| McpError::internal("system clock before epoch"))?
            .as_secs();

        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(self.issuer));
        claims.insert("sub".to_string(), json!(user.sub));
        claims.insert(
            "aud".to_string(),
            json!(request.audience.unwrap_or(&self.issuer)),
        );
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + self.ttl_seconds));
        claims.insert("jti".to_string(), json!(Uuid::new_v4().to_string()));

        if let Some(scope) = request.scope {
            claims.insert("scope".to_string(), json!(scope));
        }
        if let Some(client_id) = request.client_id {
            claims.insert("client_id".to_string(), json!(client_id));
        }
        if let Some(name) = &user.name {
            claims.insert("name".to_string(), json!(name));
        }
        if let Some(email) = &user.email {
            claims.insert("email".to_string(), json!(email));
        }
        if let Some(picture) = &user.picture {
            claims.insert("picture".to_string(), json!(picture));
        }

        if let Some(upstream) = request.upstream_access_token {
            let encrypted = encrypt_upstream_token(&self.encryption_key, upstream)?;
            claims.insert("upstream_token".to_string(), serde_json::to_value(encrypted)?);
        }

        if let Some(mapper) = &self.mapper {
            mapper(&mut claims);
        }

        encode(
            &Header::new(Algorithm::HS256),
            &Value::Object(claims),
            &EncodingKey::from_secret(self.signing_secret.as_bytes()),
        )
        .map_err(|e| McpError::internal(format!("token signing failed: {e}")))
    }
}

impl std::fmt::Debug for TokenMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenMinter")
            .field("issuer", &self.issuer)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}
