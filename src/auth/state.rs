//! Signed proxy state for the federated authorization flow
//!
//! The authorize endpoint records pending authorizations under a proxy
//! `state` forwarded to the upstream provider: a UUID joined with the first
//! 8 hex characters of its HMAC-SHA-256 under the session secret. The
//! callback verifies the suffix before touching the pending table, so forged
//! or mutated state values are rejected without a lookup.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::auth::pkce::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 8;

/// Issues and verifies signed state values
#[derive(Debug, Clone)]
pub struct StateCodec {
    secret: String,
}

impl StateCodec {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a fresh unpredictable state value `<uuid>.<hmac8>`
    pub fn issue(&self) -> String {
        let nonce = Uuid::new_v4().to_string();
        let signature = self.sign(&nonce);
        format!("{nonce}.{signature}")
    }

    /// Verify a state value's HMAC suffix
    pub fn verify(&self, state: &str) -> bool {
        let Some((nonce, signature)) = state.rsplit_once('.') else {
            return false;
        };
        if signature.len() != SIGNATURE_LEN {
            return false;
        }
        constant_time_eq(&self.sign(nonce), signature)
    }

    fn sign(&self, nonce: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(nonce.as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(digest)[..SIGNATURE_LEN].to_string()
    }
}
